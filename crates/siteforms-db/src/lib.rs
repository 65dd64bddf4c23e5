//! # siteforms-db
//!
//! SQLite persistence layer for siteforms.
//!
//! This crate provides:
//! - Connection pool management
//! - The envelope repository (one JSON record array per content type)
//! - Upload storage with a pluggable backend
//!
//! ## Example
//!
//! ```rust,ignore
//! use siteforms_db::Database;
//! use siteforms_core::EnvelopeRepository;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite://siteforms.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let saved = db
//!         .envelopes
//!         .upsert_by_type("faq", vec![serde_json::json!({"question": "Q", "answer": "A"})])
//!         .await?;
//!     println!("Saved envelope: {}", saved.id);
//!     Ok(())
//! }
//! ```

pub mod envelopes;
pub mod pool;
pub mod uploads;

pub use envelopes::SqliteEnvelopeRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use uploads::{FilesystemBackend, StorageBackend, UploadStore};

use siteforms_core::{Error, Result};

/// Combined database context.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::SqlitePool,
    /// Envelope repository for the generic upsert store.
    pub envelopes: SqliteEnvelopeRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            envelopes: SqliteEnvelopeRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }
}
