//! Store client for the form upsert endpoint.
//!
//! Records travel as multipart form data. Scalar fields are flattened to
//! `values[i][field]` parts, list fields to `values[i][field][j]`, and
//! pending attachments ride alongside as `file{i}` or `video{i}` parts
//! that the server resolves into public URLs before persisting.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use siteforms_core::{Envelope, Error, FormRecord, FormValue, Result};

/// A record set encoded for the wire, independent of any HTTP library.
#[derive(Debug, Default, Clone)]
pub struct WireForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<WireFile>,
}

/// One attachment part, named after the index of the record that owns it.
#[derive(Clone)]
pub struct WireFile {
    pub part_name: String,
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for WireFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireFile")
            .field("part_name", &self.part_name)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Flattens records into multipart field names the store understands.
pub fn encode_records<R: FormRecord>(records: &[R]) -> WireForm {
    let mut form = WireForm::default();
    for (index, record) in records.iter().enumerate() {
        for (name, value) in record.fields() {
            match value {
                FormValue::Text(text) => {
                    form.fields.push((format!("values[{index}][{name}]"), text));
                }
                FormValue::List(entries) => {
                    for (slot, entry) in entries.into_iter().enumerate() {
                        form.fields
                            .push((format!("values[{index}][{name}][{slot}]"), entry));
                    }
                }
            }
        }
        if let (Some(attachment), Some(kind)) = (record.attachment(), R::attachment_kind()) {
            if !attachment.bytes.is_empty() {
                form.files.push(WireFile {
                    part_name: format!("{}{index}", kind.part_prefix()),
                    filename: attachment.filename.clone(),
                    content_type: attachment.content_type.clone(),
                    bytes: attachment.bytes.clone(),
                });
            }
        }
    }
    form
}

/// Transport seam between the editing session and the form store.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Fetches whatever the store holds for a content type.
    async fn fetch(&self, content_type: &str) -> Result<JsonValue>;

    /// Creates or replaces the envelope for a content type.
    async fn create(&self, content_type: &str, form: WireForm) -> Result<Envelope>;

    /// Replaces the values of a known envelope.
    async fn replace(&self, content_type: &str, id: Uuid, form: WireForm) -> Result<Envelope>;

    /// Deletes an envelope by id.
    async fn delete(&self, content_type: &str, id: Uuid) -> Result<()>;
}

/// [`StoreClient`] backed by reqwest against a running form API.
pub struct HttpStoreClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpStoreClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, content_type: &str) -> String {
        format!("{}/api/form/{}", self.base_url, content_type)
    }

    fn multipart(form: WireForm) -> Result<reqwest::multipart::Form> {
        let mut body = reqwest::multipart::Form::new();
        for (name, value) in form.fields {
            body = body.text(name, value);
        }
        for file in form.files {
            let mime = if file.content_type.is_empty() {
                "application/octet-stream".to_string()
            } else {
                file.content_type
            };
            let part = reqwest::multipart::Part::bytes(file.bytes)
                .file_name(file.filename)
                .mime_str(&mime)
                .map_err(|e| Error::Request(format!("invalid attachment mime type: {e}")))?;
            body = body.part(file.part_name, part);
        }
        Ok(body)
    }

    async fn expect_envelope(response: reqwest::Response) -> Result<Envelope> {
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!("store returned {status}: {detail}")));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl StoreClient for HttpStoreClient {
    async fn fetch(&self, content_type: &str) -> Result<JsonValue> {
        let response = self.http.get(self.endpoint(content_type)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!("store returned {status}: {detail}")));
        }
        Ok(response.json().await?)
    }

    async fn create(&self, content_type: &str, form: WireForm) -> Result<Envelope> {
        let response = self
            .http
            .post(self.endpoint(content_type))
            .multipart(Self::multipart(form)?)
            .send()
            .await?;
        Self::expect_envelope(response).await
    }

    async fn replace(&self, content_type: &str, id: Uuid, form: WireForm) -> Result<Envelope> {
        let mut body = Self::multipart(form)?;
        body = body.text("id", id.to_string());
        let response = self
            .http
            .put(self.endpoint(content_type))
            .multipart(body)
            .send()
            .await?;
        Self::expect_envelope(response).await
    }

    async fn delete(&self, content_type: &str, id: Uuid) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}?id={}", self.endpoint(content_type), id))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!("store returned {status}: {detail}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteforms_core::{FileAttachment, HighlightItem, Service};

    #[test]
    fn encodes_scalar_fields_by_index() {
        let mut first = Service::default();
        first.title = "Hosting".into();
        first.description = "Managed hosting".into();
        let mut second = Service::default();
        second.title = "Design".into();

        let form = encode_records(&[first, second]);
        assert!(form
            .fields
            .contains(&("values[0][title]".to_string(), "Hosting".to_string())));
        assert!(form
            .fields
            .contains(&("values[0][description]".to_string(), "Managed hosting".to_string())));
        assert!(form
            .fields
            .contains(&("values[1][title]".to_string(), "Design".to_string())));
        assert!(form.files.is_empty());
    }

    #[test]
    fn encodes_list_fields_with_slot_suffix() {
        let mut item = HighlightItem::default();
        item.text_lists = vec!["fast".into(), "reliable".into()];
        item.video = "https://cdn.example.com/clip.mp4".into();

        let form = encode_records(&[item]);
        assert!(form
            .fields
            .contains(&("values[0][textLists][0]".to_string(), "fast".to_string())));
        assert!(form
            .fields
            .contains(&("values[0][textLists][1]".to_string(), "reliable".to_string())));
    }

    #[test]
    fn names_attachment_parts_after_record_index() {
        let mut first = Service::default();
        first.title = "Hosting".into();
        let mut second = Service::default();
        second.title = "Design".into();
        second.file = Some(FileAttachment {
            filename: "design.png".into(),
            content_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        });

        let form = encode_records(&[first, second]);
        assert_eq!(form.files.len(), 1);
        assert_eq!(form.files[0].part_name, "file1");
        assert_eq!(form.files[0].filename, "design.png");
    }

    #[test]
    fn skips_empty_attachments() {
        let mut item = Service::default();
        item.title = "Hosting".into();
        item.file = Some(FileAttachment {
            filename: "empty.png".into(),
            content_type: "image/png".into(),
            bytes: vec![],
        });

        let form = encode_records(&[item]);
        assert!(form.files.is_empty());
    }
}
