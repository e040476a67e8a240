use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://www.ebi.ac.uk/pride/ws/archive/v2";
pub const DEFAULT_CHUNK_SIZE: usize = 8192;
const CONFIG_FILE_NAME: &str = "proteomics-pipeline.json";
const MAX_BACKOFF_FACTOR: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub backoff_factor: f64,
    pub cache_enabled: bool,
    pub cache_dir: Utf8PathBuf,
    pub cache_max_age_secs: u64,
    pub chunk_size: usize,
    pub output_dir: Utf8PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            backoff_factor: 2.0,
            cache_enabled: true,
            cache_dir: Utf8PathBuf::from("data/cache"),
            cache_max_age_secs: 24 * 60 * 60,
            chunk_size: DEFAULT_CHUNK_SIZE,
            output_dir: Utf8PathBuf::from("data/raw"),
        }
    }
}

impl ClientConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(self.timeout_secs),
            max_attempts: self.max_retries.max(1),
            backoff_factor: self.backoff_factor,
        }
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age_secs)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ClientConfig, PipelineError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE_NAME),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ClientConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| PipelineError::ConfigRead(config_path.clone()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<ClientConfig, PipelineError> {
        let config: ClientConfig = serde_json::from_str(content)
            .map_err(|err| PipelineError::ConfigParse(err.to_string()))?;
        if config.timeout_secs == 0 {
            return Err(PipelineError::ConfigParse(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        if config.chunk_size == 0 {
            return Err(PipelineError::ConfigParse(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if !(config.backoff_factor.is_finite()
            && (0.0..=MAX_BACKOFF_FACTOR).contains(&config.backoff_factor))
        {
            return Err(PipelineError::ConfigParse(format!(
                "backoff_factor must be between 0 and {MAX_BACKOFF_FACTOR}"
            )));
        }
        Ok(config)
    }
}
