//! List-editing state engine for siteforms.
//!
//! [`ListSession`] holds the collection being edited for one content type;
//! [`StoreClient`] is the transport seam, with [`HttpStoreClient`] talking
//! to a running form API over multipart HTTP.

pub mod client;
pub mod session;

pub use client::{encode_records, HttpStoreClient, StoreClient, WireFile, WireForm};
pub use session::{AddOutcome, DeleteTarget, ListSession, SortOrder, SubmitOutcome};
