use std::str::FromStr;
use std::time::SystemTime;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

pub const IN_MEMORY: &str = ":memory:";

/// Opens the SQLite database, creating the file when missing.
///
/// `:memory:` yields a single long-lived connection so every query sees the same database.
pub async fn connect(database_file: &str) -> Result<SqlitePool> {
    if database_file == IN_MEMORY {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        return SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database");
    }

    let options = SqliteConnectOptions::new()
        .filename(database_file)
        .create_if_missing(true);
    SqlitePool::connect_with(options)
        .await
        .with_context(|| format!("Failed to open database {}", database_file))
}

pub(crate) fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
