use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::handler::BlogRequest;
use crate::jobs::JobRecord;
use crate::routes::LatestArtifact;

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for a running blog generator.
#[derive(Clone, Debug)]
pub struct BlogClient {
    http: Client,
    base: Url,
}

impl BlogClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base = Url::parse(base_url).with_context(|| format!("Invalid URL {}", base_url))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    /// Legacy submit. `true` means the request was accepted, not that a blog was stored.
    pub async fn submit(&self, topic: &str) -> Result<bool> {
        let response = self
            .http
            .post(self.url("blog-generation")?)
            .json(&BlogRequest {
                blog_topic: topic.to_string(),
            })
            .send()
            .await?;
        debug!("Legacy submit answered {}", response.status());
        Ok(response.status() == StatusCode::OK)
    }

    /// Tracked submit, returns the pending job.
    pub async fn generate(&self, topic: &str) -> Result<JobRecord> {
        let response = self
            .http
            .post(self.url("v1/blogs")?)
            .json(&BlogRequest {
                blog_topic: topic.to_string(),
            })
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    pub async fn status(&self, id: &str) -> Result<JobRecord> {
        let response = self
            .http
            .get(self.url(&format!("v1/blogs/{}", id))?)
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    pub async fn content(&self, id: &str) -> Result<String> {
        let response = self
            .http
            .get(self.url(&format!("v1/blogs/{}/content", id))?)
            .send()
            .await?;
        Ok(expect_success(response).await?.text().await?)
    }

    /// Newest artifact in the store. It may predate a submit that has not finished yet.
    pub async fn latest(&self) -> Result<Option<LatestArtifact>> {
        let response = self.http.get(self.url("v1/blogs/latest")?).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(expect_success(response).await?.json().await?))
    }

    /// Polls the job until it reaches a terminal state or `timeout` passes.
    pub async fn wait_for(&self, id: &str, interval: Duration, timeout: Duration) -> Result<JobRecord> {
        let started = Instant::now();
        loop {
            let record = self.status(id).await?;
            if record.state.is_terminal() {
                return Ok(record);
            }
            if started.elapsed() >= timeout {
                bail!("Job {} still {} after {:?}", id, record.state, timeout);
            }
            tokio::time::sleep(interval).await;
        }
    }
}

async fn expect_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    Err(anyhow!("Server answered {}: {}", status, message))
}
