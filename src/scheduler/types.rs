//! Scheduler type definitions.
//!
//! This module contains error types, state enums, and command types for the scheduler.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::core::expression::ScheduleError;
use crate::core::job::{JobRecord, JobUpdate};
use crate::core::types::JobId;
use crate::storage::StorageError;

/// Errors that can occur in the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The job has no in-memory schedule entry.
    #[error("job not active: {0}")]
    JobNotActive(String),

    /// The job's schedule could not be parsed or has no upcoming occurrence.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The scheduler is stopped and does not accept new jobs.
    #[error("scheduler is not running")]
    NotRunning,

    /// Channel error.
    #[error("channel error: {0}")]
    ChannelError(String),
}

/// State of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Scheduler is stopped: no timers are armed.
    Stopped,
    /// Scheduler is running.
    Running,
}

/// A job currently armed in the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledJob {
    pub job_id: JobId,
    /// Instant the armed timer fires at.
    pub next_fire: DateTime<Utc>,
    /// Generation of the armed timer; changes every time the job is re-armed.
    pub generation: u64,
}

/// Commands that can be sent to the scheduler.
pub(crate) enum SchedulerCommand {
    /// Load active jobs and arm their timers.
    Start {
        response: oneshot::Sender<Result<usize, SchedulerError>>,
    },
    /// Cancel every timer and forget all entries.
    Stop { response: oneshot::Sender<()> },
    /// Schedule a job, replacing any entry with the same id.
    AddJob {
        job: JobRecord,
        response: oneshot::Sender<Result<DateTime<Utc>, SchedulerError>>,
    },
    /// Persist an update and reschedule the job.
    UpdateJob {
        job_id: JobId,
        update: JobUpdate,
        response: oneshot::Sender<Result<JobRecord, SchedulerError>>,
    },
    /// Unschedule a job.
    RemoveJob {
        job_id: JobId,
        response: oneshot::Sender<bool>,
    },
    /// List armed jobs.
    ScheduledJobs {
        response: oneshot::Sender<Vec<ScheduledJob>>,
    },
    /// Shutdown the scheduler.
    Shutdown { response: oneshot::Sender<()> },
}
