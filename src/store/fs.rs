use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::debug;

use crate::error::StorageError;
use crate::key::RequestId;
use crate::store::{validate_key, ArtifactStore, ObjectMeta};

const TEMP_PREFIX: &str = ".tmp-";

/// Objects as files under `<root>/<bucket>/<key>`.
#[derive(Clone, Debug)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the bucket directory if it is missing.
    pub async fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let dir = self.bucket_dir(bucket)?;
        fs::create_dir_all(&dir).await?;
        debug!("Bucket directory ready at {}", dir.display());
        Ok(())
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        if bucket.contains('/') {
            return Err(StorageError::InvalidKey(bucket.to_string()));
        }
        validate_key(bucket)?;
        Ok(self.root.join(bucket))
    }

    async fn existing_bucket_dir(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        let dir = self.bucket_dir(bucket)?;
        if !fs::try_exists(&dir).await? {
            return Err(StorageError::BucketNotFound(bucket.to_string()));
        }
        Ok(dir)
    }
}

#[async_trait]
impl ArtifactStore for FsStore {
    async fn put(&self, bucket: &str, key: &str, body: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let path = self.existing_bucket_dir(bucket).await?.join(key);
        let parent = path.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&parent).await?;

        // Write aside and rename so a concurrent writer of the same key replaces whole files
        let temp = parent.join(format!("{}{}", TEMP_PREFIX, RequestId::generate()));
        fs::write(&temp, body.as_bytes()).await?;
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<String, StorageError> {
        validate_key(key)?;
        let path = self.existing_bucket_dir(bucket).await?.join(key);
        match fs::read_to_string(&path).await {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let bucket_dir = self.existing_bucket_dir(bucket).await?;
        let mut objects = Vec::new();
        let mut pending = vec![bucket_dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if !file_type.is_file() || entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                    continue;
                }

                let key = object_key(&bucket_dir, &path);
                if !key.starts_with(prefix) {
                    continue;
                }
                let metadata = entry.metadata().await?;
                objects.push(ObjectMeta {
                    key,
                    size: metadata.len(),
                    last_modified: DateTime::<Utc>::from(metadata.modified()?),
                });
            }
        }

        Ok(objects)
    }
}

fn object_key(bucket_dir: &Path, path: &Path) -> String {
    path.strip_prefix(bucket_dir)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
