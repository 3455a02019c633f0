//! YAML configuration parsing.
//!
//! Parses the global configuration file: API binding, storage backend, delivery
//! policy, timer limits, alerting and optional seed jobs.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::core::job::DeliveryMode;
use crate::core::schedule::Schedule;
use crate::scheduler::DEFAULT_MAX_TIMER_DELAY;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML.
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Missing required field.
    #[error("missing required field: {0}")]
    MissingField(String),
}

/// Global configuration (cronhook.yaml).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// HTTP API binding.
    pub api: ApiSection,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Outbound delivery settings.
    pub delivery: DeliveryConfig,
    /// Timer settings.
    pub scheduler: SchedulerSection,
    /// Failure alerting.
    pub alerts: AlertsConfig,
    /// Jobs created on start when no job with the same id exists.
    pub jobs: Vec<JobConfig>,
}

/// HTTP API binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub host: String,
    pub port: u16,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8565,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StorageConfig {
    /// In-memory storage (default, non-persistent).
    #[serde(rename = "memory")]
    #[default]
    Memory,
    /// SQLite storage.
    #[serde(rename = "sqlite")]
    Sqlite {
        /// Path to the database file.
        path: String,
    },
}

/// Outbound delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Timeout of a single HTTP attempt, in seconds.
    pub timeout_secs: u64,
    /// Attempt budget for at-least-once jobs, first attempt included.
    pub max_attempts: u32,
    /// Base of the linear backoff between attempts, in milliseconds.
    pub base_delay_millis: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: 3,
            base_delay_millis: 1000,
        }
    }
}

impl DeliveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_millis)
    }
}

/// Timer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    /// Longest single timer sleep before re-arming, in seconds.
    pub max_timer_delay_secs: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            max_timer_delay_secs: DEFAULT_MAX_TIMER_DELAY.as_secs(),
        }
    }
}

impl SchedulerSection {
    pub fn max_timer_delay(&self) -> Duration {
        Duration::from_secs(self.max_timer_delay_secs)
    }
}

/// Failure alerting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// URL that receives a POST for every failed occurrence.
    pub webhook_url: Option<String>,
}

/// A seed job from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job identifier.
    pub id: String,
    /// Human-readable name; defaults to the id.
    pub name: Option<String>,
    /// Six-field schedule expression.
    pub schedule: String,
    /// URL called on every occurrence.
    pub target_url: String,
    #[serde(default)]
    pub delivery_mode: DeliveryMode,
}

/// YAML configuration loader.
pub struct YamlLoader;

impl YamlLoader {
    /// Load global configuration from a file.
    pub fn load_global_config(path: impl AsRef<Path>) -> Result<GlobalConfig, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_global_config(&content)
    }

    /// Parse global configuration from a YAML string.
    pub fn parse_global_config(yaml: &str) -> Result<GlobalConfig, ConfigError> {
        let config: GlobalConfig = serde_yaml::from_str(yaml)?;
        Self::validate_global_config(&config)?;
        Ok(config)
    }

    /// Load a single job configuration from a file.
    pub fn load_job_config(path: impl AsRef<Path>) -> Result<JobConfig, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_job_config(&content)
    }

    /// Parse a single job configuration from a YAML string.
    pub fn parse_job_config(yaml: &str) -> Result<JobConfig, ConfigError> {
        let config: JobConfig = serde_yaml::from_str(yaml)?;
        Self::validate_job_config(&config)?;
        Ok(config)
    }

    /// Validate a global configuration.
    fn validate_global_config(config: &GlobalConfig) -> Result<(), ConfigError> {
        if config.delivery.max_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "delivery.max_attempts cannot be zero".into(),
            ));
        }
        if config.delivery.timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "delivery.timeout_secs cannot be zero".into(),
            ));
        }
        if config.scheduler.max_timer_delay_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "scheduler.max_timer_delay_secs cannot be zero".into(),
            ));
        }
        if matches!(&config.storage, StorageConfig::Sqlite { path } if path.is_empty()) {
            return Err(ConfigError::MissingField("storage.path".into()));
        }

        let mut job_ids: HashSet<&str> = HashSet::new();
        for job in &config.jobs {
            Self::validate_job_config(job)?;
            if !job_ids.insert(&job.id) {
                return Err(ConfigError::InvalidConfig(format!(
                    "duplicate job id: {}",
                    job.id
                )));
            }
        }

        Ok(())
    }

    /// Validate a seed job.
    fn validate_job_config(config: &JobConfig) -> Result<(), ConfigError> {
        if config.id.is_empty() {
            return Err(ConfigError::MissingField("id".into()));
        }
        if config.target_url.is_empty() {
            return Err(ConfigError::MissingField(format!(
                "target_url of job '{}'",
                config.id
            )));
        }

        Schedule::new(config.schedule.as_str()).map_err(|e| {
            ConfigError::InvalidConfig(format!(
                "job '{}' has an invalid schedule: {}",
                config.id, e
            ))
        })?;

        Ok(())
    }
}
