//! Configuration loading and parsing.
//!
//! This module provides YAML-based configuration for global settings and seed jobs.

mod builder;
mod yaml;

pub use builder::{JobConfigBuilder, load_jobs_from_directory};
pub use yaml::{
    AlertsConfig, ApiSection, ConfigError, DeliveryConfig, GlobalConfig, JobConfig,
    SchedulerSection, StorageConfig, YamlLoader,
};
