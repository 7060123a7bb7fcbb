use std::sync::Arc;

use anyhow::Result;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::bail_blog;
use crate::error::{BlogError, BlogResult, GenerationError, PipelineError, StorageError};
use crate::inference::{generate_or_empty, TextGenerator};
use crate::jobs::{JobBook, JobRecord, JobState};
use crate::key::{request_key, timestamp_key, Clock, RequestId, SystemClock};
use crate::prompt::build_prompt;
use crate::store::{latest_artifact, save_or_log, ArtifactStore, ObjectMeta};

pub const COMPLETED_MESSAGE: &str = "Blog Generation is completed";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BlogRequest {
    pub blog_topic: String,
}

impl BlogRequest {
    pub fn decode(body: &str) -> BlogResult<Self> {
        serde_json::from_str(body).map_err(|e| {
            warn!("Rejected malformed blog request: {}", e);
            BlogError::new(StatusCode::BAD_REQUEST, format!("Invalid blog request: {}", e))
        })
    }
}

/// What the legacy endpoint answers, whatever happened to the blog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StatusEnvelope {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// JSON-encoded message
    pub body: String,
}

impl StatusEnvelope {
    pub fn ok(message: &str) -> Self {
        Self {
            status_code: StatusCode::OK.as_u16(),
            body: serde_json::Value::from(message).to_string(),
        }
    }
}

/// Bucket and key prefix the artifacts are written under.
#[derive(Clone, Debug)]
pub struct StorageTarget {
    pub bucket: String,
    pub prefix: String,
}

/// Prompt, inference and storage wired together.
#[derive(Clone)]
pub struct BlogService {
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn ArtifactStore>,
    jobs: JobBook,
    clock: Arc<dyn Clock>,
    target: StorageTarget,
}

impl BlogService {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn ArtifactStore>,
        jobs: JobBook,
        target: StorageTarget,
    ) -> Self {
        Self {
            generator,
            store,
            jobs,
            clock: Arc::new(SystemClock),
            target,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn target(&self) -> &StorageTarget {
        &self.target
    }

    /// Legacy entry point: decode, generate, store, and always answer 200.
    ///
    /// Only a body that cannot be decoded is reported back as an error.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn handle(&self, body: &str) -> BlogResult<StatusEnvelope> {
        let request = BlogRequest::decode(body)?;
        self.generate_blog(&request.blog_topic).await;
        Ok(StatusEnvelope::ok(COMPLETED_MESSAGE))
    }

    /// Generates and stores one blog under a time-derived key.
    ///
    /// Returns the key written to, or `None` when generation produced nothing. Store failures
    /// are logged and still return the key.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn generate_blog(&self, topic: &str) -> Option<String> {
        info!(monotonic_counter.blog_requests = 1u64, flow = "legacy");
        let bundle = build_prompt(topic);
        let blog = generate_or_empty(self.generator.as_ref(), &bundle).await;

        if blog.is_empty() {
            info!("No blog was generated");
            return None;
        }

        let key = timestamp_key(&self.target.prefix, self.clock.now());
        save_or_log(self.store.as_ref(), &self.target.bucket, &key, &blog).await;
        Some(key)
    }

    /// Records a pending job and generates its blog in the background.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn submit(&self, topic: &str) -> Result<JobRecord> {
        let id = RequestId::generate();
        let key = request_key(&self.target.prefix, &id);
        let record = self.jobs.create(&id, topic, &key).await?;

        let service = self.clone();
        let topic = topic.to_string();
        tokio::spawn(async move { service.run_job(id, topic, key).await });

        Ok(record)
    }

    #[tracing::instrument(level = "info", skip(self, topic))]
    async fn run_job(&self, id: RequestId, topic: String, key: String) {
        info!(monotonic_counter.blog_requests = 1u64, flow = "tracked");
        let outcome = match self.generate_and_store(&topic, &key).await {
            Ok(()) => {
                info!("Job {} stored its blog at {}", id, key);
                self.jobs.complete(&id).await
            }
            Err(e) => {
                error!(monotonic_counter.blog_failures = 1u64, "Job {} failed: {}", id, e);
                self.jobs.fail(&id, &e.to_string()).await
            }
        };

        if let Err(e) = outcome {
            error!("Failed to record outcome of job {}: {}", id, e);
        }
    }

    /// The typed pipeline: every failure comes back with its reason.
    pub async fn generate_and_store(&self, topic: &str, key: &str) -> Result<(), PipelineError> {
        let bundle = build_prompt(topic);
        let blog = self.generator.generate(&bundle).await?;
        if blog.is_empty() {
            return Err(GenerationError::EmptyOutput.into());
        }
        self.store.put(&self.target.bucket, key, &blog).await?;
        Ok(())
    }

    pub async fn job(&self, id: &RequestId) -> Result<Option<JobRecord>> {
        self.jobs.get(id).await
    }

    /// Artifact of a finished job, or the status explaining why there is none.
    pub async fn job_content(&self, id: &RequestId) -> BlogResult<String> {
        let Some(job) = self.jobs.get(id).await? else {
            bail_blog!(StatusCode::NOT_FOUND, "Job {} not found", id);
        };

        match job.state {
            JobState::Pending => bail_blog!(StatusCode::CONFLICT, "Job {} is still pending", id),
            JobState::Failed => bail_blog!(
                StatusCode::BAD_GATEWAY,
                "Job {} failed: {}",
                id,
                job.failure.unwrap_or_default()
            ),
            JobState::Complete => self
                .store
                .get(&self.target.bucket, &job.artifact_key)
                .await
                .map_err(storage_error),
        }
    }

    pub async fn latest(&self) -> Result<Option<(ObjectMeta, String)>, StorageError> {
        latest_artifact(self.store.as_ref(), &self.target.bucket, &self.target.prefix).await
    }
}

pub(crate) fn storage_error(err: StorageError) -> BlogError {
    BlogError::new(err.status(), err.to_string())
}
