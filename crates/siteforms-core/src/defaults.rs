//! Centralized default constants for the siteforms system.
//!
//! **This module is the single source of truth** for shared default values.
//! All crates should reference these constants instead of defining their own
//! magic numbers.

use std::time::Duration;

// =============================================================================
// LIST-EDITING ENGINE
// =============================================================================

/// How long a transient advisory message stays visible before auto-expiring.
pub const ADVISORY_TTL: Duration = Duration::from_secs(3);

/// How long the save-success flag stays set before auto-expiring.
pub const SUCCESS_TTL: Duration = Duration::from_secs(3);

/// Length of the random alphanumeric suffix on generated client keys.
pub const CLIENT_KEY_SUFFIX_LEN: usize = 9;

// =============================================================================
// SERVER
// =============================================================================

/// Default database URL when DATABASE_URL is not set.
pub const DATABASE_URL: &str = "sqlite://siteforms.db?mode=rwc";

/// Default bind host.
pub const HOST: &str = "0.0.0.0";

/// Default bind port.
pub const PORT: u16 = 3000;

/// Default directory for stored upload files.
pub const UPLOAD_PATH: &str = "/var/lib/siteforms/uploads";

/// Default request body size ceiling (covers multipart file parts).
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
