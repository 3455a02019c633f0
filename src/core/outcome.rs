//! Recorded result of one job occurrence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::types::{ExecutionId, JobId};

/// Final status of an occurrence after all attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failure,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::Failure => "failure",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(OutcomeStatus::Success),
            "failure" => Ok(OutcomeStatus::Failure),
            other => Err(format!("unknown outcome status: {}", other)),
        }
    }
}

/// One occurrence of a job, covering every attempt made for it.
///
/// Exactly one outcome is recorded per occurrence, never one per retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Unique identifier of this record.
    pub id: ExecutionId,
    /// Job the occurrence belongs to.
    pub job_id: JobId,
    /// Scheduled instant of the occurrence.
    pub occurrence: DateTime<Utc>,
    /// Final status.
    pub status: OutcomeStatus,
    /// HTTP status of the last attempt, when a response was received.
    pub http_status: Option<u16>,
    /// Wall time from the first attempt to the final result, backoff included.
    pub duration_millis: u64,
    /// Number of attempts made.
    pub attempts: u32,
    /// Error of the last attempt, for failures.
    pub error: Option<String>,
}

impl ExecutionOutcome {
    /// Create a successful outcome.
    pub fn success(
        job_id: JobId,
        occurrence: DateTime<Utc>,
        http_status: u16,
        duration_millis: u64,
        attempts: u32,
    ) -> Self {
        Self {
            id: ExecutionId::new(),
            job_id,
            occurrence,
            status: OutcomeStatus::Success,
            http_status: Some(http_status),
            duration_millis,
            attempts,
            error: None,
        }
    }

    /// Create a failed outcome.
    pub fn failure(
        job_id: JobId,
        occurrence: DateTime<Utc>,
        http_status: Option<u16>,
        duration_millis: u64,
        attempts: u32,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: ExecutionId::new(),
            job_id,
            occurrence,
            status: OutcomeStatus::Failure,
            http_status,
            duration_millis,
            attempts,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}
