//! Core traits for siteforms abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::Envelope;

/// Repository for envelope storage: one envelope per content type.
///
/// The `values` array is always replaced wholesale; what counts as "still
/// present" or "deleted" is decided client-side before submission.
#[async_trait]
pub trait EnvelopeRepository: Send + Sync {
    /// All envelopes for a content type, most recently created first.
    ///
    /// `type` is unique so this returns at most one element today; the list
    /// shape is part of the HTTP contract.
    async fn list_by_type(&self, content_type: &str) -> Result<Vec<Envelope>>;

    /// Fetch one envelope by id.
    async fn get(&self, id: Uuid) -> Result<Option<Envelope>>;

    /// Fetch the envelope for a content type, if one exists.
    async fn get_by_type(&self, content_type: &str) -> Result<Option<Envelope>>;

    /// Create the envelope for `content_type`, or replace its entire
    /// `values` array if it already exists. Returns the saved envelope.
    async fn upsert_by_type(
        &self,
        content_type: &str,
        values: Vec<JsonValue>,
    ) -> Result<Envelope>;

    /// Replace the entire `values` array of an existing envelope.
    ///
    /// Fails with [`crate::Error::EnvelopeNotFound`] when the id does not
    /// resolve. Partial-field updates are not supported.
    async fn replace(&self, id: Uuid, values: Vec<JsonValue>) -> Result<Envelope>;

    /// Remove an envelope entirely.
    ///
    /// Fails with [`crate::Error::EnvelopeNotFound`] when the id does not
    /// resolve.
    async fn delete(&self, id: Uuid) -> Result<()>;
}
