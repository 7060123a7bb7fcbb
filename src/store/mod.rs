use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::error::StorageError;

pub mod fs;
pub mod memory;
pub mod sqlite;

/// Listing entry of a stored object.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// A flat key/value object store addressed by bucket and key.
///
/// Writes replace the whole object; the last write to a key wins.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, body: &str) -> Result<(), StorageError>;

    async fn get(&self, bucket: &str, key: &str) -> Result<String, StorageError>;

    /// Every object whose key starts with `prefix`, in no particular order.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError>;
}

/// Writes the artifact and only logs when that fails.
#[tracing::instrument(level = "info", skip(store, body))]
pub async fn save_or_log(store: &dyn ArtifactStore, bucket: &str, key: &str, body: &str) {
    match store.put(bucket, key, body).await {
        Ok(()) => info!("Blog saved to {}/{}", bucket, key),
        Err(e) => error!("Error when saving the blog to {}/{}: {}", bucket, key, e),
    }
}

/// The most recently modified object under `prefix` together with its content.
#[tracing::instrument(level = "info", skip(store))]
pub async fn latest_artifact(
    store: &dyn ArtifactStore,
    bucket: &str,
    prefix: &str,
) -> Result<Option<(ObjectMeta, String)>, StorageError> {
    let objects = store.list(bucket, prefix).await?;
    let Some(latest) = objects
        .into_iter()
        .max_by(|a, b| a.last_modified.cmp(&b.last_modified).then_with(|| a.key.cmp(&b.key)))
    else {
        return Ok(None);
    };

    let content = store.get(bucket, &latest.key).await?;
    Ok(Some((latest, content)))
}

/// Rejects keys that would escape a bucket when mapped onto a path.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let escapes = key.is_empty()
        || key.starts_with('/')
        || key.ends_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if escapes {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
