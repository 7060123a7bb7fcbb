use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::store::{validate_key, ArtifactStore, ObjectMeta};

/// Process-local store. Buckets spring into existence on first write.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<(String, String), (String, DateTime<Utc>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn put(&self, bucket: &str, key: &str, body: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.objects.write().await.insert(
            (bucket.to_string(), key.to_string()),
            (body.to_string(), Utc::now()),
        );
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<String, StorageError> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(body, _)| body.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        Ok(self
            .objects
            .read()
            .await
            .iter()
            .filter(|((b, key), _)| b == bucket && key.starts_with(prefix))
            .map(|((_, key), (body, modified))| ObjectMeta {
                key: key.clone(),
                size: body.len() as u64,
                last_modified: *modified,
            })
            .collect())
    }
}
