pub mod sink;
pub mod writer;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

/// A flat row: column name → scalar value.
pub type Record = Map<String, Value>;

/// Insert-or-update writes keyed by a natural-key column set.
#[async_trait]
pub trait Store: Send + Sync {
    /// Writes all `rows` to `table` atomically; returns rows affected.
    async fn upsert(&self, table: &str, rows: &[Record], conflict_keys: &[&str]) -> Result<u64>;
}

/// Flattens serializable rows into records.
pub fn to_records<T: Serialize>(rows: &[T]) -> Result<Vec<Record>> {
    rows.iter()
        .map(|row| match serde_json::to_value(row)? {
            Value::Object(map) => Ok(map),
            other => Err(AppError::Config(format!("row did not serialize to an object: {other}"))),
        })
        .collect()
}
