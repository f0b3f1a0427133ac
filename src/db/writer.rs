use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};

use crate::db::{Record, Store};
use crate::error::{AppError, Result};

/// SQLite-backed store. Each upsert runs in one transaction as multi-row
/// `INSERT ... ON CONFLICT DO UPDATE` statements sized to the bind limit.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database file and applies migrations.
    pub async fn open(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database ready at {db_path}");
        Ok(Self::new(pool))
    }
}

/// Lowest bound-parameter limit across SQLite builds (`SQLITE_MAX_VARIABLE_NUMBER`).
const MAX_BIND_PARAMS: usize = 999;

#[async_trait]
impl Store for SqliteStore {
    async fn upsert(&self, table: &str, rows: &[Record], conflict_keys: &[&str]) -> Result<u64> {
        let Some(first) = rows.first() else {
            return Ok(0);
        };
        let columns: Vec<&str> = first.keys().map(String::as_str).collect();
        check_identifier(table)?;
        for col in columns.iter().chain(conflict_keys) {
            check_identifier(col)?;
        }

        let rows_per_statement = (MAX_BIND_PARAMS / columns.len().max(1)).max(1);
        let mut tx = self.pool.begin().await?;
        let mut affected = 0;
        for chunk in rows.chunks(rows_per_statement) {
            let mut qb = upsert_statement(table, &columns, chunk, conflict_keys);
            affected += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        debug!(
            table,
            rows = rows.len(),
            statements = rows.len().div_ceil(rows_per_statement),
            "Upsert committed"
        );
        Ok(affected)
    }
}

/// One multi-row `INSERT ... ON CONFLICT` for a chunk of rows.
fn upsert_statement<'q>(
    table: &str,
    columns: &[&str],
    rows: &[Record],
    conflict_keys: &[&str],
) -> QueryBuilder<'q, Sqlite> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("INSERT INTO {table} ({}) ", columns.join(", ")));
    qb.push_values(rows, |mut b, row| {
        for col in columns {
            match row.get(*col).cloned().unwrap_or(Value::Null) {
                Value::Null => b.push_bind(None::<String>),
                Value::Bool(v) => b.push_bind(v),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => b.push_bind(i),
                    None => b.push_bind(n.as_f64().unwrap_or_default()),
                },
                Value::String(s) => b.push_bind(s),
                other => b.push_bind(other.to_string()),
            };
        }
    });

    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !conflict_keys.contains(*c))
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    qb.push(format!(" ON CONFLICT({}) ", conflict_keys.join(", ")));
    if updates.is_empty() {
        qb.push("DO NOTHING");
    } else {
        qb.push(format!("DO UPDATE SET {}", updates.join(", ")));
    }
    qb
}

/// Table and column names are interpolated into SQL, so only plain
/// identifiers are accepted.
fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AppError::InvalidIdentifier(name.to_string()))
    }
}
