use serde::{Deserialize, Serialize};

pub const MAX_TOKENS: u32 = 200;
pub const TEMPERATURE: f64 = 0.5;
pub const TOP_P: f64 = 0.9;
pub const TOP_K: u32 = 50;

/// Sampling parameters sent alongside the prompt.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Upper bound on generated tokens
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f64,

    /// Nucleus sampling threshold
    pub top_p: f64,

    /// Number of candidate tokens kept at each step
    pub top_k: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            top_p: TOP_P,
            top_k: TOP_K,
        }
    }
}

/// The request body of one inference call. Serializes flat, as the endpoint expects it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PromptBundle {
    pub prompt: String,
    #[serde(flatten)]
    pub params: GenerationParams,
}

/// Wraps the topic in the instruction template of the instruct model.
///
/// The topic is embedded verbatim. Delimiters inside it are not escaped.
#[tracing::instrument(level = "trace")]
pub fn build_prompt(topic: &str) -> PromptBundle {
    PromptBundle {
        prompt: format!("<s>[INST] Write a 200-word blog on the topic: {topic} [/INST]"),
        params: GenerationParams::default(),
    }
}
