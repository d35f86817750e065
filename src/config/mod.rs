use garde::Validate;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000")
    #[serde(default = "default_bind_addr")]
    #[garde(length(min = 1))]
    pub bind_addr: String,

    /// PostgreSQL connection string
    #[garde(length(min = 1))]
    pub database_url: String,

    /// Vision AI API key (bearer token)
    #[garde(length(min = 1))]
    pub ai_api_key: String,

    /// Base URL of the OpenAI-compatible chat-completions API
    #[serde(default = "default_ai_base_url")]
    #[garde(length(min = 1))]
    pub ai_base_url: String,

    /// Vision-capable model name
    #[serde(default = "default_ai_model")]
    #[garde(length(min = 1))]
    pub ai_model: String,

    /// Per-request HTTP timeout for the AI provider
    #[serde(default = "default_ai_request_timeout_secs")]
    #[garde(range(min = 1, max = 600))]
    pub ai_request_timeout_secs: u64,

    /// Base directory for locally stored uploads
    #[serde(default = "default_upload_dir")]
    #[garde(length(min = 1))]
    pub upload_dir: String,

    /// Object storage bucket; object storage is disabled when unset
    #[garde(skip)]
    pub cos_bucket: Option<String>,

    /// Object storage endpoint URL (S3-compatible)
    #[garde(skip)]
    pub cos_endpoint: Option<String>,

    #[serde(default = "default_cos_region")]
    #[garde(skip)]
    pub cos_region: String,

    #[garde(skip)]
    pub cos_access_key: Option<String>,

    #[garde(skip)]
    pub cos_secret_key: Option<String>,

    /// Maximum evaluations in flight at once
    #[serde(default = "default_queue_max_concurrent")]
    #[garde(range(min = 1, max = 1000))]
    pub queue_max_concurrent: usize,

    /// Processing budget per evaluation
    #[serde(default = "default_queue_timeout_secs")]
    #[garde(range(min = 1, max = 3600))]
    pub queue_timeout_secs: u64,
}

/// Credentials for the S3-compatible image bucket.
#[derive(Debug)]
pub struct ObjectStorageConfig<'a> {
    pub bucket: &'a str,
    pub endpoint: &'a str,
    pub region: &'a str,
    pub access_key: &'a str,
    pub secret_key: &'a str,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_ai_base_url() -> String {
    "https://api.hunyuan.cloud.tencent.com/v1".to_string()
}

fn default_ai_model() -> String {
    "hunyuan-vision".to_string()
}

fn default_ai_request_timeout_secs() -> u64 {
    90
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_cos_region() -> String {
    "auto".to_string()
}

fn default_queue_max_concurrent() -> usize {
    20
}

fn default_queue_timeout_secs() -> u64 {
    120
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_timeout_secs)
    }

    pub fn ai_request_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_request_timeout_secs)
    }

    /// Object storage settings, present only when every credential is set.
    pub fn object_storage(&self) -> Option<ObjectStorageConfig<'_>> {
        Some(ObjectStorageConfig {
            bucket: self.cos_bucket.as_deref()?,
            endpoint: self.cos_endpoint.as_deref()?,
            region: &self.cos_region,
            access_key: self.cos_access_key.as_deref()?,
            secret_key: self.cos_secret_key.as_deref()?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] garde::Report),
}
