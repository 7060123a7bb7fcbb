use async_trait::async_trait;
use serde::Deserialize;
use tracing::error;

use crate::error::GenerationError;
use crate::prompt::PromptBundle;

pub mod remote;

/// Anything that turns a prompt bundle into generated text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, bundle: &PromptBundle) -> Result<String, GenerationError>;
}

#[derive(Deserialize, Debug)]
pub struct InferenceResponse {
    pub outputs: Vec<InferenceOutput>,
}

#[derive(Deserialize, Debug)]
pub struct InferenceOutput {
    pub text: String,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl InferenceResponse {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, GenerationError> {
        serde_json::from_slice(bytes).map_err(|e| GenerationError::MalformedResponse(e.to_string()))
    }

    /// Text of the first output, everything else is dropped.
    pub fn into_text(self) -> Result<String, GenerationError> {
        self.outputs
            .into_iter()
            .next()
            .map(|output| output.text)
            .ok_or_else(|| GenerationError::MalformedResponse("no outputs in response".into()))
    }
}

/// Runs the generator and collapses every failure into an empty string.
///
/// Callers treat `""` as "generation failed". The reason only shows up in the logs.
#[tracing::instrument(level = "info", skip_all)]
pub async fn generate_or_empty(generator: &dyn TextGenerator, bundle: &PromptBundle) -> String {
    match generator.generate(bundle).await {
        Ok(text) => text,
        Err(e) => {
            error!("Error generating the blog: {}", e);
            String::new()
        }
    }
}
