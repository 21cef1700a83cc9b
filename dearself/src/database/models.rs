//! Database models
//!
//! Rust structs representing database rows.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// One key of the local store, holding a JSON document as text
#[derive(Debug, Clone, FromRow)]
pub struct StoredValue {
    pub key: String,
    /// Serialized JSON document
    pub value: String,
    pub updated_at: DateTime<Utc>,
}
