//! Scheduler handle for controlling the scheduler.
//!
//! This module provides the `SchedulerHandle` type that allows external control
//! of the scheduler through commands like add, update, remove, start, stop and shutdown.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{RwLock, mpsc, oneshot};

use crate::core::job::{JobRecord, JobUpdate};
use crate::core::types::JobId;

use super::metrics::{MetricsRecorder, SchedulerMetrics};
use super::types::{ScheduledJob, SchedulerCommand, SchedulerError, SchedulerState};

/// Buffer size for the command channel between SchedulerHandle and Scheduler.
pub(crate) const COMMAND_CHANNEL_BUFFER: usize = 32;

/// Handle for controlling the scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    pub(crate) command_tx: mpsc::Sender<SchedulerCommand>,
    pub(crate) state: Arc<RwLock<SchedulerState>>,
    pub(crate) metrics: Arc<MetricsRecorder>,
    pub(crate) live_timers: Arc<AtomicUsize>,
}

impl SchedulerHandle {
    /// Helper to send a command and wait for its response.
    async fn send_command<T>(
        &self,
        build_command: impl FnOnce(oneshot::Sender<T>) -> SchedulerCommand,
        operation: &str,
    ) -> Result<T, SchedulerError>
    where
        T: Send + 'static,
    {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(build_command(response_tx))
            .await
            .map_err(|_| {
                SchedulerError::ChannelError(format!("failed to send {} command", operation))
            })?;

        response_rx.await.map_err(|_| {
            SchedulerError::ChannelError(format!("failed to receive {} response", operation))
        })
    }

    /// Helper to send a command that returns a result and wait for response.
    async fn send_result_command<T>(
        &self,
        build_command: impl FnOnce(oneshot::Sender<Result<T, SchedulerError>>) -> SchedulerCommand,
        operation: &str,
    ) -> Result<T, SchedulerError>
    where
        T: Send + 'static,
    {
        self.send_command(build_command, operation).await?
    }

    /// Schedule a job and return the instant its timer fires at.
    ///
    /// An existing entry for the same id is cancelled first. The job is not persisted.
    pub async fn add_job(&self, job: JobRecord) -> Result<DateTime<Utc>, SchedulerError> {
        self.send_result_command(|response| SchedulerCommand::AddJob { job, response }, "add")
            .await
    }

    /// Persist an update to a scheduled job and reschedule it.
    ///
    /// Fails with [`SchedulerError::JobNotActive`] when the job is not scheduled.
    pub async fn update_job(
        &self,
        job_id: impl Into<JobId>,
        update: JobUpdate,
    ) -> Result<JobRecord, SchedulerError> {
        let job_id = job_id.into();
        self.send_result_command(
            |response| SchedulerCommand::UpdateJob {
                job_id,
                update,
                response,
            },
            "update",
        )
        .await
    }

    /// Unschedule a job. Returns whether the job was scheduled.
    pub async fn remove_job(&self, job_id: impl Into<JobId>) -> Result<bool, SchedulerError> {
        let job_id = job_id.into();
        self.send_command(
            |response| SchedulerCommand::RemoveJob { job_id, response },
            "remove",
        )
        .await
    }

    /// Load active jobs from storage and arm their timers.
    ///
    /// Does nothing when the scheduler is already running. Returns the number of
    /// scheduled jobs.
    pub async fn start(&self) -> Result<usize, SchedulerError> {
        self.send_result_command(|response| SchedulerCommand::Start { response }, "start")
            .await
    }

    /// Cancel every timer and forget all scheduled jobs.
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        self.send_command(|response| SchedulerCommand::Stop { response }, "stop")
            .await
    }

    /// Stop the scheduler and end its task.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        self.send_command(
            |response| SchedulerCommand::Shutdown { response },
            "shutdown",
        )
        .await
    }

    /// List scheduled jobs, ordered by job id.
    pub async fn scheduled_jobs(&self) -> Result<Vec<ScheduledJob>, SchedulerError> {
        self.send_command(
            |response| SchedulerCommand::ScheduledJobs { response },
            "list",
        )
        .await
    }

    /// Get a snapshot of the execution counters.
    pub fn metrics(&self) -> SchedulerMetrics {
        self.metrics.snapshot()
    }

    /// Number of timer tasks currently alive.
    pub fn live_timers(&self) -> usize {
        self.live_timers.load(Ordering::SeqCst)
    }

    /// Get the current scheduler state.
    pub async fn state(&self) -> SchedulerState {
        *self.state.read().await
    }

    /// Check if the scheduler is running.
    pub async fn is_running(&self) -> bool {
        *self.state.read().await == SchedulerState::Running
    }
}
