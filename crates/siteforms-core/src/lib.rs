//! # siteforms-core
//!
//! Core types, traits, and abstractions for the siteforms content store.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the other siteforms crates depend on: the persisted [`Envelope`],
//! the per-content-type record structs, the [`FormRecord`] trait the
//! list-editing engine is generic over, and the [`EnvelopeRepository`]
//! storage contract.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
