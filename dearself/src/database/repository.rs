//! Repository layer for database operations
//!
//! CRUD over the `kv_store` table. Values are opaque text here; JSON
//! handling lives in the storage layer.

use super::models::*;
use crate::error::Result;
use chrono::Utc;
use sqlx::SqlitePool;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the stored row for a key
    pub async fn get_value(&self, key: &str) -> Result<Option<StoredValue>> {
        let row = sqlx::query_as::<_, StoredValue>(
            r#"
            SELECT key, value, updated_at FROM kv_store WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Insert or replace the value for a key
    pub async fn put_value(&self, key: &str, value: &str) -> Result<StoredValue> {
        let now = Utc::now();

        let row = sqlx::query_as::<_, StoredValue>(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            RETURNING key, value, updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Stored key: {} ({} bytes)", key, value.len());
        Ok(row)
    }

    /// Delete a key. Returns whether a row was removed.
    pub async fn delete_value(&self, key: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Deleted key: {} ({} rows)", key, rows);
        Ok(rows > 0)
    }
}
