//! Data models for siteforms.
//!
//! The persisted unit is the [`Envelope`]: one JSON array of records per
//! content type. Records themselves are tagged per content type (one struct
//! each) rather than loosely-typed maps; the list-editing engine is generic
//! over the [`FormRecord`] trait they all implement.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// CLIENT KEYS
// =============================================================================

/// Opaque client-generated key used for stable UI list keying.
///
/// Never a persistence key: the store identifies envelopes by their own
/// UUID and identifies records only by array position. Format:
/// `{type}-{unix_millis}-{random suffix}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientKey(String);

impl ClientKey {
    /// Generate a fresh key for the given content type tag.
    pub fn generate(type_tag: &str) -> Self {
        let millis = Utc::now().timestamp_millis();
        let suffix: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(crate::defaults::CLIENT_KEY_SUFFIX_LEN)
            .map(|b| (b as char).to_ascii_lowercase())
            .collect();
        Self(format!("{}-{}-{}", type_tag, millis, suffix))
    }

    /// Wrap an existing key string (e.g. one echoed back by the store).
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// The persisted unit: one JSON array of records for one content type.
///
/// `type` is a natural unique key in the store; every write replaces the
/// whole `values` array. There is no per-record diffing server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Store-assigned envelope id (UUIDv7).
    pub id: Uuid,
    /// Content type tag ("faq", "services", "newsletter", ...).
    #[serde(rename = "type")]
    pub content_type: String,
    /// The full ordered record array.
    pub values: Vec<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// FILE ATTACHMENTS
// =============================================================================

/// Kind of file field a record carries, determining the multipart part name
/// (`file{i}` vs `video{i}`) and the record field the uploaded URL lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Video,
}

impl UploadKind {
    /// Multipart part name prefix on the wire.
    pub fn part_prefix(&self) -> &'static str {
        match self {
            UploadKind::Image => "file",
            UploadKind::Video => "video",
        }
    }

    /// Record field the stored URL is substituted into.
    pub fn target_field(&self) -> &'static str {
        match self {
            UploadKind::Image => "image",
            UploadKind::Video => "video",
        }
    }
}

/// A pending local file selection on a record.
///
/// Lives only in engine memory; serialization skips it. On submit the bytes
/// travel as a multipart file part and the persisted record keeps the
/// resulting URL instead.
#[derive(Clone, Default)]
pub struct FileAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for FileAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAttachment")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// A string field is satisfied when non-blank after trimming.
pub fn nonblank(s: &str) -> bool {
    !s.trim().is_empty()
}

/// A string-array field is satisfied when at least one element is non-blank.
pub fn any_nonblank(items: &[String]) -> bool {
    items.iter().any(|s| nonblank(s))
}

/// One named completeness check on a record, declared per page.
pub struct FieldCheck<R> {
    /// Human-readable field name (for validation display).
    pub name: &'static str,
    /// Predicate applied to the record.
    pub check: fn(&R) -> bool,
}

impl<R> FieldCheck<R> {
    pub fn passes(&self, record: &R) -> bool {
        (self.check)(record)
    }
}

/// A record is complete when every declared check passes. An empty check
/// set means always complete.
pub fn record_complete<R>(record: &R, checks: &[FieldCheck<R>]) -> bool {
    checks.iter().all(|c| c.passes(record))
}

// =============================================================================
// FORM RECORD TRAIT
// =============================================================================

/// A scalar or list value of one record field, as it appears on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    List(Vec<String>),
}

/// One item in a content collection.
///
/// Implementations are plain tagged structs (no reflective field lookup);
/// `fields()` drives the multipart wire encoding and `search_fields()`
/// drives text search.
pub trait FormRecord:
    Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Content type tag this record belongs to.
    const TYPE: &'static str;

    /// A fresh all-blank record with a newly generated [`ClientKey`].
    ///
    /// Always an independent value: two calls never alias the same data.
    fn fresh() -> Self;

    fn client_key(&self) -> Option<&ClientKey>;

    fn set_client_key(&mut self, key: ClientKey);

    /// Wire fields in declaration order. Excludes the client key and any
    /// pending file attachment.
    fn fields(&self) -> Vec<(&'static str, FormValue)>;

    /// Fields exposed to text search. Defaults to the wire fields; record
    /// types with numeric fields narrow this to their textual ones.
    fn search_fields(&self) -> Vec<(&'static str, FormValue)> {
        self.fields()
    }

    /// Pending local file selection, if this record type carries one.
    fn attachment(&self) -> Option<&FileAttachment> {
        None
    }

    /// What kind of file field this record type has, if any.
    fn attachment_kind() -> Option<UploadKind> {
        None
    }
}

// =============================================================================
// CONTENT RECORD TYPES
// =============================================================================

/// One frequently-asked question.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Faq {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ClientKey>,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

impl Faq {
    /// Canonical completeness checks for the FAQ page.
    pub const VALIDATION: &'static [FieldCheck<Faq>] = &[
        FieldCheck {
            name: "question",
            check: |f: &Faq| nonblank(&f.question),
        },
        FieldCheck {
            name: "answer",
            check: |f: &Faq| nonblank(&f.answer),
        },
    ];
}

impl FormRecord for Faq {
    const TYPE: &'static str = "faq";

    fn fresh() -> Self {
        Self {
            id: Some(ClientKey::generate(Self::TYPE)),
            ..Default::default()
        }
    }

    fn client_key(&self) -> Option<&ClientKey> {
        self.id.as_ref()
    }

    fn set_client_key(&mut self, key: ClientKey) {
        self.id = Some(key);
    }

    fn fields(&self) -> Vec<(&'static str, FormValue)> {
        vec![
            ("question", FormValue::Text(self.question.clone())),
            ("answer", FormValue::Text(self.answer.clone())),
        ]
    }
}

/// One service listing (also used by the "details" page).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Service {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ClientKey>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Stored image URL (blank until a file has been uploaded).
    #[serde(default)]
    pub image: String,
    #[serde(skip)]
    pub file: Option<FileAttachment>,
}

impl Service {
    pub const VALIDATION: &'static [FieldCheck<Service>] = &[
        FieldCheck {
            name: "title",
            check: |s: &Service| nonblank(&s.title),
        },
        FieldCheck {
            name: "description",
            check: |s: &Service| nonblank(&s.description),
        },
    ];
}

impl FormRecord for Service {
    const TYPE: &'static str = "services";

    fn fresh() -> Self {
        Self {
            id: Some(ClientKey::generate(Self::TYPE)),
            ..Default::default()
        }
    }

    fn client_key(&self) -> Option<&ClientKey> {
        self.id.as_ref()
    }

    fn set_client_key(&mut self, key: ClientKey) {
        self.id = Some(key);
    }

    fn fields(&self) -> Vec<(&'static str, FormValue)> {
        vec![
            ("title", FormValue::Text(self.title.clone())),
            ("description", FormValue::Text(self.description.clone())),
            ("image", FormValue::Text(self.image.clone())),
        ]
    }

    fn attachment(&self) -> Option<&FileAttachment> {
        self.file.as_ref()
    }

    fn attachment_kind() -> Option<UploadKind> {
        Some(UploadKind::Image)
    }
}

/// One newsletter item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ClientKey>,
    /// Text shown when the image fails to load.
    #[serde(default)]
    pub fallback: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub image: String,
    #[serde(skip)]
    pub file: Option<FileAttachment>,
}

impl NewsItem {
    pub const VALIDATION: &'static [FieldCheck<NewsItem>] = &[
        FieldCheck {
            name: "title",
            check: |n: &NewsItem| nonblank(&n.title),
        },
        FieldCheck {
            name: "fallback",
            check: |n: &NewsItem| nonblank(&n.fallback),
        },
    ];
}

impl FormRecord for NewsItem {
    const TYPE: &'static str = "newsletter";

    fn fresh() -> Self {
        Self {
            id: Some(ClientKey::generate(Self::TYPE)),
            ..Default::default()
        }
    }

    fn client_key(&self) -> Option<&ClientKey> {
        self.id.as_ref()
    }

    fn set_client_key(&mut self, key: ClientKey) {
        self.id = Some(key);
    }

    fn fields(&self) -> Vec<(&'static str, FormValue)> {
        vec![
            ("fallback", FormValue::Text(self.fallback.clone())),
            ("title", FormValue::Text(self.title.clone())),
            ("link", FormValue::Text(self.link.clone())),
            ("image", FormValue::Text(self.image.clone())),
        ]
    }

    fn attachment(&self) -> Option<&FileAttachment> {
        self.file.as_ref()
    }

    fn attachment_kind() -> Option<UploadKind> {
        Some(UploadKind::Image)
    }
}

/// One sector description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectorItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ClientKey>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(skip)]
    pub file: Option<FileAttachment>,
}

impl SectorItem {
    pub const VALIDATION: &'static [FieldCheck<SectorItem>] = &[
        FieldCheck {
            name: "title",
            check: |s: &SectorItem| nonblank(&s.title),
        },
        FieldCheck {
            name: "description",
            check: |s: &SectorItem| nonblank(&s.description),
        },
    ];
}

impl FormRecord for SectorItem {
    const TYPE: &'static str = "setors";

    fn fresh() -> Self {
        Self {
            id: Some(ClientKey::generate(Self::TYPE)),
            ..Default::default()
        }
    }

    fn client_key(&self) -> Option<&ClientKey> {
        self.id.as_ref()
    }

    fn set_client_key(&mut self, key: ClientKey) {
        self.id = Some(key);
    }

    fn fields(&self) -> Vec<(&'static str, FormValue)> {
        vec![
            ("image", FormValue::Text(self.image.clone())),
            ("link", FormValue::Text(self.link.clone())),
            ("title", FormValue::Text(self.title.clone())),
            ("description", FormValue::Text(self.description.clone())),
        ]
    }

    fn attachment(&self) -> Option<&FileAttachment> {
        self.file.as_ref()
    }

    fn attachment_kind() -> Option<UploadKind> {
        Some(UploadKind::Image)
    }
}

/// One video highlight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ClientKey>,
    /// Caption lines shown over the video.
    #[serde(rename = "textLists", default)]
    pub text_lists: Vec<String>,
    /// Stored video URL.
    #[serde(default)]
    pub video: String,
    /// Duration in seconds. Accepts a number or the string a form field
    /// carries it as.
    #[serde(rename = "videoDuration", default, deserialize_with = "lenient_f64")]
    pub video_duration: f64,
    #[serde(skip)]
    pub video_file: Option<FileAttachment>,
}

impl Default for HighlightItem {
    fn default() -> Self {
        // Two blank caption slots, matching what the highlight editor shows.
        Self {
            id: None,
            text_lists: vec![String::new(), String::new()],
            video: String::new(),
            video_duration: 0.0,
            video_file: None,
        }
    }
}

impl HighlightItem {
    pub const VALIDATION: &'static [FieldCheck<HighlightItem>] = &[
        FieldCheck {
            name: "textLists",
            check: |h: &HighlightItem| any_nonblank(&h.text_lists),
        },
        FieldCheck {
            name: "video",
            check: |h: &HighlightItem| nonblank(&h.video),
        },
    ];
}

impl FormRecord for HighlightItem {
    const TYPE: &'static str = "highlights";

    fn fresh() -> Self {
        Self {
            id: Some(ClientKey::generate(Self::TYPE)),
            ..Default::default()
        }
    }

    fn client_key(&self) -> Option<&ClientKey> {
        self.id.as_ref()
    }

    fn set_client_key(&mut self, key: ClientKey) {
        self.id = Some(key);
    }

    fn fields(&self) -> Vec<(&'static str, FormValue)> {
        vec![
            ("textLists", FormValue::List(self.text_lists.clone())),
            ("video", FormValue::Text(self.video.clone())),
            (
                "videoDuration",
                FormValue::Text(format_duration(self.video_duration)),
            ),
        ]
    }

    // The duration is a number dressed up as form text; matching a search
    // term against it would surface highlights by length in seconds.
    fn search_fields(&self) -> Vec<(&'static str, FormValue)> {
        vec![
            ("textLists", FormValue::List(self.text_lists.clone())),
            ("video", FormValue::Text(self.video.clone())),
        ]
    }

    fn attachment(&self) -> Option<&FileAttachment> {
        self.video_file.as_ref()
    }

    fn attachment_kind() -> Option<UploadKind> {
        Some(UploadKind::Video)
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::Number(n) => n.as_f64().unwrap_or(0.0),
        JsonValue::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

/// Encode a duration the way form fields carry numbers: integral values
/// without a trailing `.0`.
fn format_duration(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{}", secs as i64)
    } else {
        format!("{}", secs)
    }
}

// =============================================================================
// URL QUALIFICATION
// =============================================================================

/// Qualify a relative image/video path against the public base URL.
///
/// Absolute (`http...`) and protocol-relative (`//...`) URLs pass through
/// unchanged.
pub fn qualify_url(public_base: &str, path: &str) -> String {
    if path.starts_with("http") || path.starts_with("//") {
        return path.to_string();
    }
    let base = public_base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_keys_are_unique_and_prefixed() {
        let a = ClientKey::generate("faq");
        let b = ClientKey::generate("faq");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("faq-"));
    }

    #[test]
    fn fresh_records_never_alias() {
        let a = Faq::fresh();
        let b = Faq::fresh();
        assert_ne!(a.client_key(), b.client_key());
    }

    #[test]
    fn nonblank_trims() {
        assert!(!nonblank("   "));
        assert!(!nonblank(""));
        assert!(nonblank(" x "));
    }

    #[test]
    fn any_nonblank_needs_one_element() {
        assert!(!any_nonblank(&[]));
        assert!(!any_nonblank(&["".into(), "  ".into()]));
        assert!(any_nonblank(&["".into(), "caption".into()]));
    }

    #[test]
    fn faq_completeness() {
        let mut faq = Faq::fresh();
        assert!(!record_complete(&faq, Faq::VALIDATION));
        faq.question = "Q1".into();
        assert!(!record_complete(&faq, Faq::VALIDATION));
        faq.answer = "A1".into();
        assert!(record_complete(&faq, Faq::VALIDATION));
    }

    #[test]
    fn empty_check_set_is_always_complete() {
        let faq = Faq::fresh();
        assert!(record_complete(&faq, &[]));
    }

    #[test]
    fn highlight_wire_names() {
        let h = HighlightItem {
            text_lists: vec!["a".into(), "".into()],
            video: "v.mp4".into(),
            video_duration: 12.0,
            ..Default::default()
        };
        let json = serde_json::to_value(&h).unwrap();
        assert_eq!(json["textLists"][0], "a");
        assert_eq!(json["videoDuration"], 12.0);
    }

    #[test]
    fn attachment_is_not_serialized() {
        let svc = Service {
            title: "t".into(),
            file: Some(FileAttachment {
                filename: "pic.png".into(),
                content_type: "image/png".into(),
                bytes: vec![1, 2, 3],
            }),
            ..Default::default()
        };
        let json = serde_json::to_value(&svc).unwrap();
        assert!(json.get("file").is_none());
    }

    #[test]
    fn qualify_url_variants() {
        let base = "https://cdn.example.com";
        assert_eq!(
            qualify_url(base, "https://x.test/a.png"),
            "https://x.test/a.png"
        );
        assert_eq!(qualify_url(base, "//x.test/a.png"), "//x.test/a.png");
        assert_eq!(
            qualify_url(base, "a.png"),
            "https://cdn.example.com/a.png"
        );
        assert_eq!(
            qualify_url(base, "/a.png"),
            "https://cdn.example.com/a.png"
        );
    }

    #[test]
    fn duration_parses_from_string_or_number() {
        let from_string: HighlightItem =
            serde_json::from_value(serde_json::json!({"videoDuration": "12.5"})).unwrap();
        assert_eq!(from_string.video_duration, 12.5);
        let from_number: HighlightItem =
            serde_json::from_value(serde_json::json!({"videoDuration": 7})).unwrap();
        assert_eq!(from_number.video_duration, 7.0);
        let garbage: HighlightItem =
            serde_json::from_value(serde_json::json!({"videoDuration": "n/a"})).unwrap();
        assert_eq!(garbage.video_duration, 0.0);
    }

    #[test]
    fn duration_formats_like_a_form_field() {
        assert_eq!(format_duration(0.0), "0");
        assert_eq!(format_duration(12.0), "12");
        assert_eq!(format_duration(12.5), "12.5");
    }
}
