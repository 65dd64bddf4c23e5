//! The list-editing session.
//!
//! One [`ListSession`] owns the in-memory collection for a single content
//! type: load, validation-gated append, filtered views, staged delete
//! confirmation, and submit. Every operation is a synchronous state change
//! on the owned `Vec`; network traffic goes through a [`StoreClient`] so
//! callers (and tests) pick the transport.

use std::time::{Duration, Instant};

use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use uuid::Uuid;

use siteforms_core::defaults::{ADVISORY_TTL, SUCCESS_TTL};
use siteforms_core::{record_complete, ClientKey, FieldCheck, FormRecord, FormValue, Result};

use crate::client::{encode_records, StoreClient};

const MSG_SEARCH_ACTIVE: &str = "Clear the search before adding a new item.";
const MSG_LAST_INCOMPLETE: &str = "Fill in the current item before adding another.";
const MSG_NOTHING_COMPLETE: &str = "Add at least one complete item before saving.";

/// Presentation order of the collection, by original insertion index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// A staged delete awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    /// One record, by original index. The label is shown in the
    /// confirmation prompt.
    Single { index: usize, label: String },
    /// The whole collection.
    All,
}

/// Outcome of [`ListSession::add_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    SearchActive,
    LastIncomplete,
}

/// Outcome of [`ListSession::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Saved,
    NothingToSave,
    Failed,
}

/// A transient user-facing notice. Expires on its own; never blocks
/// further interaction.
#[derive(Debug, Clone)]
struct Notice {
    message: String,
    posted_at: Instant,
    ttl: Duration,
}

impl Notice {
    fn new(message: impl Into<String>, ttl: Duration) -> Self {
        Self {
            message: message.into(),
            posted_at: Instant::now(),
            ttl,
        }
    }

    fn expired(&self) -> bool {
        self.posted_at.elapsed() >= self.ttl
    }
}

/// Editing state for one content collection.
pub struct ListSession<R: FormRecord> {
    items: Vec<R>,
    /// Content type tag on the wire. Usually `R::TYPE`, but one record
    /// shape can serve several types (services doubles as "details").
    type_tag: &'static str,
    validation: &'static [FieldCheck<R>],
    /// Store envelope id once known. `None` until the first successful
    /// load or save, so the next submit creates by type.
    envelope: Option<Uuid>,
    search: String,
    sort_order: SortOrder,
    show_validation: bool,
    delete_intent: Option<DeleteTarget>,
    advisory: Option<Notice>,
    success: Option<Notice>,
    pending_focus: Option<ClientKey>,
}

impl<R: FormRecord> ListSession<R> {
    /// New session seeded with one fresh default record.
    pub fn new(validation: &'static [FieldCheck<R>]) -> Self {
        Self::with_type_tag(R::TYPE, validation)
    }

    /// New session targeting a type tag other than `R::TYPE`.
    pub fn with_type_tag(type_tag: &'static str, validation: &'static [FieldCheck<R>]) -> Self {
        let mut session = Self {
            items: Vec::new(),
            type_tag,
            validation,
            envelope: None,
            search: String::new(),
            sort_order: SortOrder::default(),
            show_validation: false,
            delete_intent: None,
            advisory: None,
            success: None,
            pending_focus: None,
        };
        let seed = session.fresh_record();
        session.items.push(seed);
        session
    }

    fn fresh_record(&self) -> R {
        let mut record = R::fresh();
        if self.type_tag != R::TYPE {
            record.set_client_key(ClientKey::generate(self.type_tag));
        }
        record
    }

    // -- accessors ------------------------------------------------------

    pub fn items(&self) -> &[R] {
        &self.items
    }

    pub fn record_mut(&mut self, index: usize) -> Option<&mut R> {
        self.items.get_mut(index)
    }

    pub fn envelope_id(&self) -> Option<Uuid> {
        self.envelope
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn set_sort_order(&mut self, order: SortOrder) {
        self.sort_order = order;
    }

    /// Whether per-field validation hints should be rendered.
    pub fn show_validation(&self) -> bool {
        self.show_validation
    }

    pub fn delete_intent(&self) -> Option<&DeleteTarget> {
        self.delete_intent.as_ref()
    }

    /// Current advisory message, if one is active and unexpired.
    pub fn advisory(&self) -> Option<&str> {
        self.advisory
            .as_ref()
            .filter(|n| !n.expired())
            .map(|n| n.message.as_str())
    }

    /// Whether the last submit succeeded recently.
    pub fn save_succeeded(&self) -> bool {
        self.success.as_ref().map_or(false, |n| !n.expired())
    }

    /// Takes the key of a just-added record so the caller can bring it
    /// into view. One-shot.
    pub fn take_pending_focus(&mut self) -> Option<ClientKey> {
        self.pending_focus.take()
    }

    fn post_advisory(&mut self, message: impl Into<String>) {
        self.advisory = Some(Notice::new(message, ADVISORY_TTL));
    }

    // -- load -----------------------------------------------------------

    /// Fetches the stored collection. On fetch failure the local state is
    /// kept as-is.
    pub async fn load<C: StoreClient>(&mut self, client: &C) {
        match client.fetch(self.type_tag).await {
            Ok(body) => self.adopt_fetched(body),
            Err(e) => {
                warn!(
                    subsystem = "engine",
                    content_type = self.type_tag,
                    error = %e,
                    "load failed, keeping local state"
                );
            }
        }
    }

    /// Accepts either an array of envelopes or a bare array of records.
    /// A bare array leaves the envelope id unknown, so the next submit
    /// creates by type (which upserts server-side).
    fn adopt_fetched(&mut self, body: JsonValue) {
        let Some(entries) = body.as_array() else {
            warn!(
                subsystem = "engine",
                content_type = self.type_tag,
                "unexpected load response shape"
            );
            return;
        };
        if entries.is_empty() {
            self.items = vec![self.fresh_record()];
            self.envelope = None;
            return;
        }
        if entries[0].get("values").is_some() {
            match serde_json::from_value::<siteforms_core::Envelope>(entries[0].clone()) {
                Ok(env) => {
                    self.envelope = Some(env.id);
                    self.adopt_values(&env.values);
                }
                Err(e) => {
                    warn!(
                        subsystem = "engine",
                        content_type = self.type_tag,
                        error = %e,
                        "envelope in load response failed to parse"
                    );
                }
            }
        } else {
            self.envelope = None;
            self.adopt_values(entries);
        }
    }

    /// Replaces the collection with deserialized records, generating
    /// client keys where missing. An empty result seeds one fresh record.
    fn adopt_values(&mut self, values: &[JsonValue]) {
        let mut adopted = Vec::with_capacity(values.len());
        for value in values {
            match serde_json::from_value::<R>(value.clone()) {
                Ok(mut record) => {
                    if record.client_key().is_none() {
                        record.set_client_key(ClientKey::generate(self.type_tag));
                    }
                    adopted.push(record);
                }
                Err(e) => {
                    warn!(
                        subsystem = "engine",
                        content_type = self.type_tag,
                        error = %e,
                        "skipping malformed record"
                    );
                }
            }
        }
        if adopted.is_empty() {
            self.items = vec![self.fresh_record()];
        } else {
            self.items = adopted;
        }
    }

    // -- append ---------------------------------------------------------

    /// False while a search term is set; otherwise true iff the last
    /// record is complete.
    pub fn can_add_new_item(&self) -> bool {
        if !self.search.is_empty() {
            return false;
        }
        self.items
            .last()
            .map_or(true, |last| record_complete(last, self.validation))
    }

    /// Appends `item` (or a fresh default) when allowed. A rejected add
    /// leaves the collection untouched and posts an advisory.
    pub fn add_item(&mut self, item: Option<R>) -> AddOutcome {
        if !self.search.is_empty() {
            self.post_advisory(MSG_SEARCH_ACTIVE);
            return AddOutcome::SearchActive;
        }
        if let Some(last) = self.items.last() {
            if !record_complete(last, self.validation) {
                self.show_validation = true;
                self.post_advisory(MSG_LAST_INCOMPLETE);
                return AddOutcome::LastIncomplete;
            }
        }
        let record = item.unwrap_or_else(|| self.fresh_record());
        self.pending_focus = record.client_key().cloned();
        self.items.push(record);
        self.show_validation = false;
        AddOutcome::Added
    }

    // -- views ----------------------------------------------------------

    /// Records matching the search term, paired with their original index,
    /// in the configured order. Never mutates the collection.
    pub fn filtered_items(&self) -> Vec<(usize, &R)> {
        let needle = self.search.to_lowercase();
        let mut visible: Vec<(usize, &R)> = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, record)| needle.is_empty() || matches_search(*record, &needle))
            .collect();
        if self.sort_order == SortOrder::Desc {
            visible.reverse();
        }
        visible
    }

    pub fn clear_filters(&mut self) {
        self.search.clear();
        self.sort_order = SortOrder::default();
    }

    /// Number of complete records, for progress display.
    pub fn complete_count(&self) -> usize {
        self.items
            .iter()
            .filter(|r| record_complete(*r, self.validation))
            .count()
    }

    // -- delete flow ----------------------------------------------------

    pub fn open_delete_single(&mut self, index: usize, label: impl Into<String>) {
        self.delete_intent = Some(DeleteTarget::Single {
            index,
            label: label.into(),
        });
    }

    pub fn open_delete_all(&mut self) {
        self.delete_intent = Some(DeleteTarget::All);
    }

    pub fn close_delete_modal(&mut self) {
        self.delete_intent = None;
    }

    /// Executes the staged delete. Deleting everything (or the last
    /// remaining record) resets to one fresh default. When an envelope
    /// exists, `persist` receives the envelope id and the new collection;
    /// a persist failure posts an advisory but the staged intent is
    /// cleared either way.
    pub async fn confirm_delete<F, Fut>(&mut self, persist: F)
    where
        F: FnOnce(Uuid, Vec<R>) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let Some(target) = self.delete_intent.take() else {
            return;
        };
        match target {
            DeleteTarget::All => {
                self.items = vec![self.fresh_record()];
                self.clear_filters();
                self.show_validation = false;
            }
            DeleteTarget::Single { index, .. } => {
                if index >= self.items.len() {
                    return;
                }
                if self.items.len() == 1 {
                    self.items = vec![self.fresh_record()];
                } else {
                    self.items.remove(index);
                }
            }
        }
        if let Some(id) = self.envelope {
            if let Err(e) = persist(id, self.items.clone()).await {
                warn!(
                    subsystem = "engine",
                    content_type = self.type_tag,
                    envelope_id = %id,
                    error = %e,
                    "persisting delete failed"
                );
                self.post_advisory(e.to_string());
            }
        }
    }

    // -- submit ---------------------------------------------------------

    /// Sends every complete record to the store, replacing the whole
    /// stored array. On success the returned envelope's values replace
    /// the local collection (records keep or gain client keys).
    pub async fn submit<C: StoreClient>(&mut self, client: &C) -> SubmitOutcome {
        self.success = None;
        let complete: Vec<R> = self
            .items
            .iter()
            .filter(|r| record_complete(*r, self.validation))
            .cloned()
            .collect();
        if complete.is_empty() {
            self.post_advisory(MSG_NOTHING_COMPLETE);
            return SubmitOutcome::NothingToSave;
        }
        debug!(
            subsystem = "engine",
            content_type = self.type_tag,
            record_count = complete.len(),
            replacing = self.envelope.is_some(),
            "submitting collection"
        );
        let form = encode_records(&complete);
        let sent = match self.envelope {
            Some(id) => client.replace(self.type_tag, id, form).await,
            None => client.create(self.type_tag, form).await,
        };
        match sent {
            Ok(envelope) => {
                self.envelope = Some(envelope.id);
                self.adopt_values(&envelope.values);
                self.show_validation = false;
                self.success = Some(Notice::new("saved", SUCCESS_TTL));
                SubmitOutcome::Saved
            }
            Err(e) => {
                warn!(
                    subsystem = "engine",
                    content_type = self.type_tag,
                    error = %e,
                    "submit failed"
                );
                self.post_advisory(e.to_string());
                SubmitOutcome::Failed
            }
        }
    }
}

/// Case-insensitive substring match over every searchable field.
fn matches_search<R: FormRecord>(record: &R, needle: &str) -> bool {
    record.search_fields().iter().any(|(_, value)| match value {
        FormValue::Text(text) => text.to_lowercase().contains(needle),
        FormValue::List(entries) => entries
            .iter()
            .any(|entry| entry.to_lowercase().contains(needle)),
    })
}
