//! SQLite implementation of EnvelopeRepository.
//!
//! One row per content type in `form_data`; the record array is stored as a
//! JSON text column and always replaced wholesale. Concurrent writers to the
//! same type clobber each other; there is no version check, last write wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use siteforms_core::{Envelope, EnvelopeRepository, Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

pub struct SqliteEnvelopeRepository {
    pool: SqlitePool,
}

impl SqliteEnvelopeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_envelope(row: &SqliteRow) -> Result<Envelope> {
        let id: String = row.get("id");
        let values_json: String = row.get("values_json");
        Ok(Envelope {
            id: Uuid::parse_str(&id).map_err(|e| Error::Serialization(e.to_string()))?,
            content_type: row.get("type"),
            values: serde_json::from_str(&values_json)?,
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
            updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
        })
    }
}

#[async_trait]
impl EnvelopeRepository for SqliteEnvelopeRepository {
    async fn list_by_type(&self, content_type: &str) -> Result<Vec<Envelope>> {
        let rows = sqlx::query(
            r#"
            SELECT id, type, values_json, created_at, updated_at
            FROM form_data
            WHERE type = ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(content_type)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::row_to_envelope).collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Envelope>> {
        let row = sqlx::query(
            r#"
            SELECT id, type, values_json, created_at, updated_at
            FROM form_data
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::row_to_envelope).transpose()
    }

    async fn get_by_type(&self, content_type: &str) -> Result<Option<Envelope>> {
        let row = sqlx::query(
            r#"
            SELECT id, type, values_json, created_at, updated_at
            FROM form_data
            WHERE type = ?1
            "#,
        )
        .bind(content_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::row_to_envelope).transpose()
    }

    async fn upsert_by_type(
        &self,
        content_type: &str,
        values: Vec<serde_json::Value>,
    ) -> Result<Envelope> {
        let now = Utc::now();
        let values_json = serde_json::to_string(&values)?;

        // Fresh id only applies on insert; conflict keeps the existing row's id.
        sqlx::query(
            r#"
            INSERT INTO form_data (id, type, values_json, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT (type) DO UPDATE SET
                values_json = excluded.values_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::now_v7().to_string())
        .bind(content_type)
        .bind(&values_json)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            op = "upsert",
            content_type = content_type,
            record_count = values.len(),
            "Envelope upserted"
        );

        self.get_by_type(content_type).await?.ok_or_else(|| {
            Error::Internal(format!("envelope for '{}' vanished after upsert", content_type))
        })
    }

    async fn replace(&self, id: Uuid, values: Vec<serde_json::Value>) -> Result<Envelope> {
        if self.get(id).await?.is_none() {
            return Err(Error::EnvelopeNotFound(id));
        }

        let values_json = serde_json::to_string(&values)?;
        sqlx::query(
            r#"
            UPDATE form_data
            SET values_json = ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .bind(&values_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            op = "replace",
            envelope_id = %id,
            record_count = values.len(),
            "Envelope values replaced"
        );

        self.get(id)
            .await?
            .ok_or(Error::EnvelopeNotFound(id))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM form_data WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::EnvelopeNotFound(id));
        }

        debug!(subsystem = "db", op = "delete", envelope_id = %id, "Envelope deleted");
        Ok(())
    }
}
