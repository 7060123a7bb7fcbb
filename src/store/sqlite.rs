use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::db::unix_millis;
use crate::error::StorageError;
use crate::store::{validate_key, ArtifactStore, ObjectMeta};

/// Objects as rows of an `artifact` table. Buckets are implicit.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(pool: SqlitePool) -> Result<Self, StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS artifact (
                bucket TEXT NOT NULL,
                key TEXT NOT NULL,
                body TEXT NOT NULL,
                last_modified INTEGER NOT NULL,
                PRIMARY KEY (bucket, key)
            )",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl ArtifactStore for SqliteStore {
    async fn put(&self, bucket: &str, key: &str, body: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        sqlx::query(
            "INSERT INTO artifact (bucket, key, body, last_modified) VALUES (?, ?, ?, ?)
             ON CONFLICT (bucket, key) DO UPDATE SET body = excluded.body, last_modified = excluded.last_modified",
        )
        .bind(bucket)
        .bind(key)
        .bind(body)
        .bind(unix_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<String, StorageError> {
        let row = sqlx::query("SELECT body FROM artifact WHERE bucket = ? AND key = ?")
            .bind(bucket)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.try_get("body")?),
            None => Err(StorageError::NotFound(key.to_string())),
        }
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let rows = sqlx::query(
            "SELECT key, length(CAST(body AS BLOB)) AS size, last_modified FROM artifact
             WHERE bucket = ? AND substr(key, 1, length(?)) = ?",
        )
        .bind(bucket)
        .bind(prefix)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<ObjectMeta, StorageError> {
                let millis: i64 = row.try_get("last_modified")?;
                let size: i64 = row.try_get("size")?;
                Ok(ObjectMeta {
                    key: row.try_get("key")?,
                    size: size.max(0) as u64,
                    last_modified: DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default(),
                })
            })
            .collect()
    }
}
