//! Structured logging schema and field name constants for siteforms.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across a request. Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event. Values: "api", "db", "engine", "uploads"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name. Examples: "upsert", "replace", "load", "submit"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Content type tag being operated on ("faq", "services", ...).
pub const CONTENT_TYPE: &str = "content_type";

/// Envelope UUID being operated on.
pub const ENVELOPE_ID: &str = "envelope_id";

/// Number of records in a values array.
pub const RECORD_COUNT: &str = "record_count";

/// Stored name of an uploaded file.
pub const UPLOAD_NAME: &str = "upload_name";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Byte length of a payload or file.
pub const BYTES: &str = "bytes";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
