#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use blog_generator::db;
use blog_generator::error::{GenerationError, StorageError};
use blog_generator::handler::{BlogService, StorageTarget};
use blog_generator::inference::TextGenerator;
use blog_generator::jobs::JobBook;
use blog_generator::key::Clock;
use blog_generator::prompt::PromptBundle;
use blog_generator::store::memory::MemoryStore;
use blog_generator::store::{ArtifactStore, ObjectMeta};
use chrono::{DateTime, Local, TimeZone};
use tokio::net::TcpListener;

pub const BUCKET: &str = "test-bucket";
pub const PREFIX: &str = "blog-output";

/// Answers every prompt the same way and remembers what it was asked.
pub struct ScriptedGenerator {
    reply: Result<String, String>,
    delay: Duration,
    pub prompts: Mutex<Vec<PromptBundle>>,
}

impl ScriptedGenerator {
    pub fn text(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            reply: Err(reason.to_string()),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, bundle: &PromptBundle) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(bundle.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply
            .clone()
            .map_err(GenerationError::Transport)
    }
}

/// Memory store that counts writes.
#[derive(Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    puts: AtomicUsize,
}

impl RecordingStore {
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for RecordingStore {
    async fn put(&self, bucket: &str, key: &str, body: &str) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(bucket, key, body).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<String, StorageError> {
        self.inner.get(bucket, key).await
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        self.inner.list(bucket, prefix).await
    }
}

/// A store whose bucket never exists.
pub struct FailingStore;

#[async_trait]
impl ArtifactStore for FailingStore {
    async fn put(&self, bucket: &str, _key: &str, _body: &str) -> Result<(), StorageError> {
        Err(StorageError::BucketNotFound(bucket.to_string()))
    }

    async fn get(&self, bucket: &str, _key: &str) -> Result<String, StorageError> {
        Err(StorageError::BucketNotFound(bucket.to_string()))
    }

    async fn list(&self, bucket: &str, _prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        Err(StorageError::BucketNotFound(bucket.to_string()))
    }
}

pub struct FixedClock(pub DateTime<Local>);

impl FixedClock {
    pub fn at(hour: u32, minute: u32, second: u32) -> Self {
        Self(Local.with_ymd_and_hms(2024, 6, 1, hour, minute, second).unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

pub async fn service(
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn ArtifactStore>,
) -> BlogService {
    let pool = db::connect(db::IN_MEMORY).await.unwrap();
    let jobs = JobBook::new(pool).await.unwrap();
    BlogService::new(
        generator,
        store,
        jobs,
        StorageTarget {
            bucket: BUCKET.to_string(),
            prefix: PREFIX.to_string(),
        },
    )
}

/// Serves the router on an ephemeral local port.
pub async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    addr
}

/// A local address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn is_timestamp_key(key: &str) -> bool {
    let Some(stamp) = key
        .strip_prefix("blog-output/")
        .and_then(|rest| rest.strip_suffix(".txt"))
    else {
        return false;
    };
    stamp.len() == 6 && stamp.bytes().all(|b| b.is_ascii_digit())
}
