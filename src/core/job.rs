//! Job records and delivery settings.
//!
//! A job pairs a schedule expression with the URL it calls and the delivery
//! guarantee applied when that call fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::types::JobId;

/// Delivery guarantee applied to each occurrence of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryMode {
    /// Retry failed calls until one succeeds or the attempt budget is spent.
    #[default]
    AtLeastOnce,
    /// Make exactly one attempt.
    NoRetry,
}

impl DeliveryMode {
    /// Wire name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::AtLeastOnce => "AT_LEAST_ONCE",
            DeliveryMode::NoRetry => "NO_RETRY",
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AT_LEAST_ONCE" => Ok(DeliveryMode::AtLeastOnce),
            "NO_RETRY" => Ok(DeliveryMode::NoRetry),
            other => Err(format!("unknown delivery mode: {}", other)),
        }
    }
}

/// Lifecycle status of a persisted job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Active,
    /// Soft-deleted: the record is kept but never scheduled.
    Deleted,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(JobStatus::Active),
            "deleted" => Ok(JobStatus::Deleted),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// A persisted job definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique job identifier.
    pub id: JobId,
    /// Human-readable job name.
    pub name: String,
    /// Six-field schedule expression, as submitted.
    pub schedule: String,
    /// URL called on every occurrence.
    pub target_url: String,
    /// Delivery guarantee for each occurrence.
    pub delivery_mode: DeliveryMode,
    /// Lifecycle status.
    pub status: JobStatus,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a new active job record.
    pub fn new(
        id: impl Into<JobId>,
        schedule: impl Into<String>,
        target_url: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let now = Utc::now();
        Self {
            name: id.to_string(),
            id,
            schedule: schedule.into(),
            target_url: target_url.into(),
            delivery_mode: DeliveryMode::default(),
            status: JobStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the delivery mode.
    pub fn with_delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.delivery_mode = mode;
        self
    }

    /// Check whether the job is eligible for scheduling.
    pub fn is_active(&self) -> bool {
        self.status == JobStatus::Active
    }
}

/// Partial update of a job record. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobUpdate {
    pub name: Option<String>,
    pub schedule: Option<String>,
    pub target_url: Option<String>,
    pub delivery_mode: Option<DeliveryMode>,
    pub status: Option<JobStatus>,
}

impl JobUpdate {
    /// Builder: change the schedule expression.
    pub fn schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    /// Builder: change the target URL.
    pub fn target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = Some(url.into());
        self
    }

    /// Builder: change the delivery mode.
    pub fn delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.delivery_mode = Some(mode);
        self
    }

    /// Check whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the update to a record, bumping `updated_at`.
    pub fn apply_to(&self, record: &mut JobRecord) {
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        if let Some(schedule) = &self.schedule {
            record.schedule = schedule.clone();
        }
        if let Some(url) = &self.target_url {
            record.target_url = url.clone();
        }
        if let Some(mode) = self.delivery_mode {
            record.delivery_mode = mode;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        record.updated_at = Utc::now();
    }
}
