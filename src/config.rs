use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{Result, ClientError};

/// Environment variable overriding `api.base_url`
pub const API_URL_ENV: &str = "SHURO_API_URL";

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_entries() -> usize {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the shuro service (e.g., http://localhost:8000)
    pub base_url: String,
    /// Additional attempts for GET requests on transient status codes
    pub retry_count: u32,
    /// Base delay between retries; the n-th retry waits n times this value
    pub retry_delay_ms: u64,
    /// Overall timeout of a single HTTP request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval between status checks of an active project
    pub job_interval_ms: u64,
    /// Interval between refreshes of list views
    pub list_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// File holding recently viewed project ids
    pub path: PathBuf,
    /// Maximum number of ids kept
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:8000".to_string(),
                retry_count: 2,
                retry_delay_ms: 1000,
                timeout_secs: default_timeout_secs(),
            },
            polling: PollingConfig {
                job_interval_ms: 2000,
                list_interval_ms: 15000,
            },
            history: HistoryConfig {
                path: PathBuf::from(".shuro/history.json"),
                max_entries: default_max_entries(),
            },
        }
    }
}

impl ApiConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PollingConfig {
    pub fn job_interval(&self) -> Duration {
        Duration::from_millis(self.job_interval_ms)
    }

    pub fn list_interval(&self) -> Duration {
        Duration::from_millis(self.list_interval_ms)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ClientError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ClientError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ClientError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Apply environment overrides on top of the loaded file
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api.base_url = url.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.api.base_url.trim();
        if url.is_empty() {
            return Err(ClientError::Config("api.base_url must not be empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ClientError::InvalidUrl(format!(
                "api.base_url must start with http:// or https://, got '{}'",
                url
            )));
        }
        if self.polling.job_interval_ms == 0 || self.polling.list_interval_ms == 0 {
            return Err(ClientError::Config("polling intervals must be greater than zero".to_string()));
        }
        if self.history.max_entries == 0 {
            return Err(ClientError::Config("history.max_entries must be greater than zero".to_string()));
        }
        Ok(())
    }
}
