//! The generic form endpoint: `/api/form/{type}`.
//!
//! Records arrive as multipart fields named `values[i][field]` (scalars) and
//! `values[i][field][j]` (string-array slots). File parts named `file{i}` or
//! `video{i}` are written to the upload store first and the resulting public
//! URL lands in record i's `image` / `video` field. Only then does the
//! envelope write happen, so a failed upload aborts the whole submit.

use std::sync::OnceLock;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info};
use uuid::Uuid;

use siteforms_core::{Envelope, EnvelopeRepository, UploadKind};

use crate::{ApiError, AppState};

/// Upper bound on record/slot indices in multipart field names.
const MAX_INDEX: usize = 10_000;

fn value_field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^values\[(\d+)\]\[([A-Za-z0-9_]+)\](?:\[(\d+)\])?$").unwrap()
    })
}

fn file_field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(file|video)(\d+)$").unwrap())
}

/// A file part held back until all fields are read.
struct PendingUpload {
    index: usize,
    kind: UploadKind,
    filename: String,
    data: Vec<u8>,
}

/// A fully parsed multipart submission.
struct Submission {
    values: Vec<JsonValue>,
    id: Option<Uuid>,
}

fn parse_index(raw: &str) -> Result<usize, ApiError> {
    let index: usize = raw
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid index '{}'", raw)))?;
    if index >= MAX_INDEX {
        return Err(ApiError::BadRequest(format!("index {} out of range", index)));
    }
    Ok(index)
}

fn ensure_len(records: &mut Vec<Map<String, JsonValue>>, index: usize) {
    if records.len() <= index {
        records.resize(index + 1, Map::new());
    }
}

async fn read_submission(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<Submission, ApiError> {
    let mut records: Vec<Map<String, JsonValue>> = Vec::new();
    let mut uploads: Vec<PendingUpload> = Vec::new();
    let mut id: Option<Uuid> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if let Some(caps) = value_field_re().captures(&name) {
            let index = parse_index(&caps[1])?;
            let field_name = caps[2].to_string();
            let slot = match caps.get(3) {
                Some(m) => Some(parse_index(m.as_str())?),
                None => None,
            };
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(format!("unreadable field '{name}': {e}")))?;

            ensure_len(&mut records, index);
            let record = &mut records[index];
            match slot {
                None => {
                    record.insert(field_name, JsonValue::String(text));
                }
                Some(slot) => {
                    let entry = record
                        .entry(field_name)
                        .or_insert_with(|| JsonValue::Array(Vec::new()));
                    if let JsonValue::Array(items) = entry {
                        if items.len() <= slot {
                            items.resize(slot + 1, JsonValue::String(String::new()));
                        }
                        items[slot] = JsonValue::String(text);
                    }
                }
            }
        } else if let Some(caps) = file_field_re().captures(&name) {
            let kind = if &caps[1] == "file" {
                UploadKind::Image
            } else {
                UploadKind::Video
            };
            let index = parse_index(&caps[2])?;
            let filename = field.file_name().unwrap_or("upload").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("unreadable file part '{name}': {e}")))?;
            // empty file inputs are sent as zero-byte parts; skip them
            if !data.is_empty() {
                uploads.push(PendingUpload {
                    index,
                    kind,
                    filename,
                    data: data.to_vec(),
                });
            }
        } else if name == "id" {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(format!("unreadable field 'id': {e}")))?;
            let parsed = Uuid::parse_str(text.trim())
                .map_err(|_| ApiError::BadRequest(format!("invalid envelope id '{}'", text)))?;
            id = Some(parsed);
        } else {
            debug!(subsystem = "api", field = %name, "ignoring unknown multipart field");
        }
    }

    // Uploads run before any envelope write; a failure here aborts the
    // whole submit with nothing persisted.
    for upload in uploads {
        let url = state.uploads.store(&upload.filename, &upload.data).await?;
        info!(
            subsystem = "api",
            upload_name = %upload.filename,
            bytes = upload.data.len(),
            url = %url,
            "stored upload"
        );
        ensure_len(&mut records, upload.index);
        records[upload.index].insert(upload.kind.target_field().to_string(), JsonValue::String(url));
    }

    Ok(Submission {
        values: records.into_iter().map(JsonValue::Object).collect(),
        id,
    })
}

/// `GET /api/form/{type}`: every envelope for the type, newest first.
/// Unknown types yield an empty array.
pub async fn list_envelopes(
    State(state): State<AppState>,
    Path(content_type): Path<String>,
) -> Result<Json<Vec<Envelope>>, ApiError> {
    Ok(Json(state.db.envelopes.list_by_type(&content_type).await?))
}

/// `POST /api/form/{type}`: create or replace the envelope for the type.
pub async fn create_envelope(
    State(state): State<AppState>,
    Path(content_type): Path<String>,
    multipart: Multipart,
) -> Result<Json<Envelope>, ApiError> {
    let submission = read_submission(&state, multipart).await?;
    let envelope = state
        .db
        .envelopes
        .upsert_by_type(&content_type, submission.values)
        .await?;
    info!(
        subsystem = "api",
        content_type = %content_type,
        envelope_id = %envelope.id,
        record_count = envelope.values.len(),
        "envelope upserted"
    );
    Ok(Json(envelope))
}

/// `PUT /api/form/{type}`: replace the values of a known envelope. The
/// multipart body must carry an `id` field; an unknown id is a 404.
pub async fn replace_envelope(
    State(state): State<AppState>,
    Path(content_type): Path<String>,
    multipart: Multipart,
) -> Result<Json<Envelope>, ApiError> {
    let submission = read_submission(&state, multipart).await?;
    let id = submission
        .id
        .ok_or_else(|| ApiError::BadRequest("missing 'id' field".to_string()))?;
    let envelope = state.db.envelopes.replace(id, submission.values).await?;
    info!(
        subsystem = "api",
        content_type = %content_type,
        envelope_id = %envelope.id,
        record_count = envelope.values.len(),
        "envelope replaced"
    );
    Ok(Json(envelope))
}

#[derive(Deserialize)]
pub struct DeleteParams {
    id: Option<String>,
}

/// `DELETE /api/form/{type}?id=...`: remove an envelope.
pub async fn delete_envelope(
    State(state): State<AppState>,
    Path(content_type): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, ApiError> {
    let raw = params
        .id
        .ok_or_else(|| ApiError::BadRequest("missing 'id' query parameter".to_string()))?;
    let id = Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::BadRequest(format!("invalid envelope id '{}'", raw)))?;
    state.db.envelopes.delete(id).await?;
    info!(
        subsystem = "api",
        content_type = %content_type,
        envelope_id = %id,
        "envelope deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_field_names_parse() {
        let caps = value_field_re().captures("values[0][question]").unwrap();
        assert_eq!(&caps[1], "0");
        assert_eq!(&caps[2], "question");
        assert!(caps.get(3).is_none());

        let caps = value_field_re().captures("values[2][textLists][1]").unwrap();
        assert_eq!(&caps[1], "2");
        assert_eq!(&caps[2], "textLists");
        assert_eq!(&caps[3], "1");

        assert!(value_field_re().captures("values[x][title]").is_none());
        assert!(value_field_re().captures("values[0]").is_none());
    }

    #[test]
    fn file_field_names_parse() {
        let caps = file_field_re().captures("file0").unwrap();
        assert_eq!(&caps[1], "file");
        assert_eq!(&caps[2], "0");

        let caps = file_field_re().captures("video12").unwrap();
        assert_eq!(&caps[1], "video");
        assert_eq!(&caps[2], "12");

        assert!(file_field_re().captures("attachment0").is_none());
        assert!(file_field_re().captures("file").is_none());
    }

    #[test]
    fn index_bounds_are_enforced() {
        assert_eq!(parse_index("3").unwrap(), 3);
        assert!(parse_index("10000").is_err());
        assert!(parse_index("99999999999999999999").is_err());
    }

    #[test]
    fn ensure_len_pads_with_empty_records() {
        let mut records = Vec::new();
        ensure_len(&mut records, 2);
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.is_empty()));
    }
}
