use std::time::Duration;

use anyhow::Result;
use clap::ValueEnum;
use clap_serde_derive::ClapSerde;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "BlogGenerator.toml";

#[derive(ClapSerde, Debug, Clone)]
pub struct Config {
    /// The address the listener binds to
    #[default("0.0.0.0".to_string())]
    #[arg(long, env)]
    pub address: String,

    /// The port the listener binds to
    #[default(25566)]
    #[arg(short, long, env)]
    pub port: u16,

    /// Region of the model hosting service
    #[default("us-east-1".to_string())]
    #[arg(long, env)]
    pub region: String,

    /// Identifier of the hosted model
    #[default("mistral.mistral-7b-instruct-v0:2".to_string())]
    #[arg(long, env)]
    pub model_id: String,

    /// Full invoke URL, derived from region and model id when empty
    #[default(String::new())]
    #[arg(long, env)]
    pub inference_endpoint: String,

    /// Bearer key sent to the inference endpoint, none when empty
    #[default(String::new())]
    #[arg(long, env = "AWS_BEARER_TOKEN_BEDROCK")]
    pub inference_api_key: String,

    /// Read timeout for a single inference attempt in seconds
    #[default(300)]
    #[arg(long, env)]
    pub read_timeout_secs: u64,

    /// Attempts made against the inference endpoint before giving up
    #[default(3)]
    #[arg(long, env)]
    pub max_attempts: u32,

    /// Bucket the artifacts are written to
    #[default("awsbedrockcourseak".to_string())]
    #[arg(short, long, env)]
    pub bucket: String,

    /// Key prefix of every artifact
    #[default("blog-output".to_string())]
    #[arg(long, env)]
    pub artifact_prefix: String,

    /// Object store backend
    #[default(StoreBackend::Fs)]
    #[arg(long, env, value_enum)]
    pub store_backend: StoreBackend,

    /// Root directory of the filesystem object store
    #[default("object-store".to_string())]
    #[arg(long, env)]
    pub store_root: String,

    /// SQLite file holding job records and the sqlite object store, `:memory:` for none
    #[default("blog_generator.db".to_string())]
    #[arg(short, long, env)]
    pub database_file: String,

    /// OTLP collector endpoint, telemetry export is disabled when empty
    #[default(String::new())]
    #[arg(long, env)]
    pub otlp_endpoint: String,

    /// Also log to the console when exporting telemetry
    #[default(true)]
    #[arg(long, env)]
    pub console_log: bool,
}

#[derive(ValueEnum, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Fs,
    Sqlite,
    Memory,
}

impl Config {
    pub fn from_toml(path: &str) -> Result<<Self as ClapSerde>::Opt> {
        let str = std::fs::read_to_string(path)?;
        let opt = toml::from_str(&str)?;
        Ok(opt)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn otlp_endpoint(&self) -> Option<&str> {
        non_empty(&self.otlp_endpoint)
    }

    pub fn inference_api_key(&self) -> Option<&str> {
        non_empty(&self.inference_api_key)
    }

    pub fn inference_endpoint(&self) -> Option<&str> {
        non_empty(&self.inference_endpoint)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}
