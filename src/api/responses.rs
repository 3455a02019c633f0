//! API request and response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::job::{DeliveryMode, JobRecord};
use crate::core::outcome::ExecutionOutcome;
use crate::scheduler::{SchedulerMetrics, SchedulerState};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Scheduler state response.
#[derive(Debug, Serialize)]
pub struct SchedulerStateResponse {
    pub state: SchedulerState,
    pub is_running: bool,
}

impl From<SchedulerState> for SchedulerStateResponse {
    fn from(state: SchedulerState) -> Self {
        Self {
            state,
            is_running: state == SchedulerState::Running,
        }
    }
}

/// Execution counters plus the scheduler's live view.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub metrics: SchedulerMetrics,
    pub scheduled_jobs: usize,
    pub live_timers: usize,
}

/// Body of `POST /api/jobs`.
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    /// Job id; generated when absent.
    pub id: Option<String>,
    /// Display name; defaults to the id.
    pub name: Option<String>,
    pub schedule: String,
    pub target_url: String,
    #[serde(default)]
    pub delivery_mode: DeliveryMode,
}

/// A job with its next fire instant, when scheduled.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub name: String,
    pub schedule: String,
    pub target_url: String,
    pub delivery_mode: DeliveryMode,
    pub status: String,
    pub next_fire: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobResponse {
    pub fn new(job: JobRecord, next_fire: Option<DateTime<Utc>>) -> Self {
        Self {
            id: job.id.to_string(),
            name: job.name,
            schedule: job.schedule,
            target_url: job.target_url,
            delivery_mode: job.delivery_mode,
            status: job.status.to_string(),
            next_fire,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// List of jobs response.
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobResponse>,
    pub count: usize,
}

/// One recorded occurrence.
#[derive(Debug, Serialize)]
pub struct ExecutionResponse {
    pub id: String,
    pub job_id: String,
    pub occurrence: DateTime<Utc>,
    pub status: String,
    pub http_status: Option<u16>,
    pub duration_ms: u64,
    pub attempts: u32,
    pub error: Option<String>,
}

impl From<ExecutionOutcome> for ExecutionResponse {
    fn from(outcome: ExecutionOutcome) -> Self {
        Self {
            id: outcome.id.to_string(),
            job_id: outcome.job_id.to_string(),
            occurrence: outcome.occurrence,
            status: outcome.status.to_string(),
            http_status: outcome.http_status,
            duration_ms: outcome.duration_millis,
            attempts: outcome.attempts,
            error: outcome.error,
        }
    }
}

/// List of executions response.
#[derive(Debug, Serialize)]
pub struct ExecutionListResponse {
    pub executions: Vec<ExecutionResponse>,
    pub count: usize,
}

/// Simple message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
