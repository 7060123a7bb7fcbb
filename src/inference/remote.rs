use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::error::GenerationError;
use crate::inference::{InferenceResponse, TextGenerator};
use crate::prompt::PromptBundle;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Calls a hosted model over its HTTP invoke endpoint.
#[derive(Clone)]
pub struct RemoteInference {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    max_attempts: u32,
}

impl RemoteInference {
    pub fn new(
        endpoint: Url,
        api_key: Option<String>,
        read_timeout: Duration,
        max_attempts: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(read_timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(read_timeout))
            .build()
            .context("Failed to build inference HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            max_attempts: max_attempts.max(1),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let endpoint = match config.inference_endpoint() {
            Some(endpoint) => Url::parse(endpoint)
                .with_context(|| format!("Invalid inference endpoint {}", endpoint))?,
            None => invoke_url(&config.region, &config.model_id)?,
        };
        info!("Inference endpoint: {}", endpoint);
        Self::new(
            endpoint,
            config.inference_api_key().map(str::to_string),
            config.read_timeout(),
            config.max_attempts,
        )
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// One request, no retries.
    async fn attempt(&self, bundle: &PromptBundle, attempt: u32) -> Result<Vec<u8>, GenerationError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .json(bundle);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify(e, attempt))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify(e, attempt))?;

        if !status.is_success() {
            return Err(GenerationError::Status {
                code: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body.to_vec())
    }

    /// Sends the bundle, retrying transient failures up to `max_attempts` times.
    async fn send_with_retries(&self, bundle: &PromptBundle) -> Result<Vec<u8>, GenerationError> {
        let mut attempt = 1;
        loop {
            match self.attempt(bundle, attempt).await {
                Err(e) if attempt < self.max_attempts && is_transient(&e) => {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                    warn!(
                        "Inference attempt {}/{} failed: {}, retrying in {:?}",
                        attempt, self.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl TextGenerator for RemoteInference {
    #[tracing::instrument(level = "info", skip(self, bundle), fields(endpoint = %self.endpoint))]
    async fn generate(&self, bundle: &PromptBundle) -> Result<String, GenerationError> {
        let body = self.send_with_retries(bundle).await?;
        let response = InferenceResponse::from_slice(&body)?;
        debug!("Inference response: {:?}", response);
        response.into_text()
    }
}

/// Invoke URL of a model hosted in the given region.
pub fn invoke_url(region: &str, model_id: &str) -> Result<Url> {
    let mut url = Url::parse(&format!("https://bedrock-runtime.{}.amazonaws.com/", region))
        .with_context(|| format!("Invalid region {}", region))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("Invoke URL cannot be a base"))?
        .clear()
        .extend(["model", model_id, "invoke"]);
    Ok(url)
}

fn classify(err: reqwest::Error, attempt: u32) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout(attempt)
    } else {
        GenerationError::Transport(err.to_string())
    }
}

fn is_transient(err: &GenerationError) -> bool {
    match err {
        GenerationError::Transport(_) | GenerationError::Timeout(_) => true,
        GenerationError::Status { code, .. } => StatusCode::from_u16(*code)
            .map(|status| status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS)
            .unwrap_or(false),
        GenerationError::MalformedResponse(_) | GenerationError::EmptyOutput => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoke_url_is_derived_from_region_and_model() {
        let url = invoke_url("us-east-1", "mistral.mistral-7b-instruct-v0:2").unwrap();
        assert_eq!(url.host_str(), Some("bedrock-runtime.us-east-1.amazonaws.com"));
        assert!(url.path().starts_with("/model/mistral.mistral-7b-instruct-v0"));
        assert!(url.path().ends_with("/invoke"));
    }

    #[test]
    fn only_transport_level_failures_are_retried() {
        assert!(is_transient(&GenerationError::Transport("reset".into())));
        assert!(is_transient(&GenerationError::Timeout(1)));
        assert!(is_transient(&GenerationError::Status { code: 503, body: String::new() }));
        assert!(is_transient(&GenerationError::Status { code: 429, body: String::new() }));
        assert!(!is_transient(&GenerationError::Status { code: 400, body: String::new() }));
        assert!(!is_transient(&GenerationError::MalformedResponse("x".into())));
    }
}
