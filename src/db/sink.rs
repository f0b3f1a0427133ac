use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::info;

use crate::db::{Record, Store};
use crate::error::Result;

/// Stamps `updated_at` on every row and hands them to the store in a single
/// call. Store errors propagate unchanged.
pub async fn upsert(store: &dyn Store, table: &str, mut rows: Vec<Record>, conflict_keys: &[&str]) -> Result<u64> {
    if rows.is_empty() {
        info!(table, "No rows to write");
        return Ok(0);
    }

    let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    for row in &mut rows {
        row.insert("updated_at".to_string(), Value::String(updated_at.clone()));
    }

    let affected = store.upsert(table, &rows, conflict_keys).await?;
    info!(table, rows = rows.len(), affected, "Upsert complete");
    Ok(affected)
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::db::{Record, Store};
    use crate::error::{AppError, Result};

    /// Keeps every upsert call in memory; optionally fails every write.
    #[derive(Default)]
    pub struct MemoryStore {
        pub calls: Mutex<Vec<(String, Vec<Record>, Vec<String>)>>,
        pub fail: bool,
    }

    #[async_trait]
    impl Store for MemoryStore {
        async fn upsert(&self, table: &str, rows: &[Record], conflict_keys: &[&str]) -> Result<u64> {
            if self.fail {
                return Err(AppError::Database(sqlx::Error::PoolClosed));
            }
            self.calls.lock().unwrap().push((
                table.to_string(),
                rows.to_vec(),
                conflict_keys.iter().map(|k| k.to_string()).collect(),
            ));
            Ok(rows.len() as u64)
        }
    }
}
