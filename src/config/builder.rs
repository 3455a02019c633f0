//! Runtime objects built from YAML configuration.
//!
//! This module converts seed job entries into job records and the delivery
//! section into a retry policy.

use std::path::Path;

use crate::core::job::JobRecord;
use crate::core::retry::RetryPolicy;

use super::yaml::{ConfigError, DeliveryConfig, JobConfig, YamlLoader};

/// Builder for creating job records from YAML configuration.
pub struct JobConfigBuilder;

impl JobConfigBuilder {
    /// Build an active job record from a JobConfig.
    pub fn build(config: JobConfig) -> JobRecord {
        let name = config.name.unwrap_or_else(|| config.id.clone());
        JobRecord::new(config.id, config.schedule, config.target_url)
            .with_name(name)
            .with_delivery_mode(config.delivery_mode)
    }

    /// Build the at-least-once retry policy from the delivery section.
    pub fn build_retry_policy(config: &DeliveryConfig) -> RetryPolicy {
        RetryPolicy::linear(config.max_attempts, config.base_delay())
    }
}

/// Load all job configurations from a directory, one job per file.
pub fn load_jobs_from_directory(dir: impl AsRef<Path>) -> Result<Vec<JobRecord>, ConfigError> {
    let dir = dir.as_ref();
    let mut jobs = Vec::new();

    if !dir.is_dir() {
        return Err(ConfigError::InvalidConfig(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        // Only process .yaml and .yml files
        if let Some(ext) = path.extension()
            && (ext == "yaml" || ext == "yml")
        {
            paths.push(path);
        }
    }
    paths.sort();

    for path in paths {
        let config = YamlLoader::load_job_config(&path)?;
        jobs.push(JobConfigBuilder::build(config));
    }

    Ok(jobs)
}
