//! Execution dispatcher.
//!
//! The `Dispatcher` performs the outbound calls for one job occurrence:
//! - Retries according to the job's delivery mode and the configured policy
//! - Records exactly one outcome per occurrence, whatever the attempt count
//! - Raises a failure alert without waiting for alert handlers

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use super::transport::{DeliveryRequest, Transport};
use crate::core::job::JobRecord;
use crate::core::outcome::ExecutionOutcome;
use crate::core::retry::RetryPolicy;
use crate::events::{Event, EventBus, FailureAlert};
use crate::storage::Storage;

/// Runs job occurrences against a transport and records their outcomes.
pub struct Dispatcher<S: Storage> {
    storage: Arc<S>,
    transport: Arc<dyn Transport>,
    retry_policy: RetryPolicy,
    event_bus: Option<Arc<EventBus>>,
}

impl<S: Storage> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            transport: Arc::clone(&self.transport),
            retry_policy: self.retry_policy.clone(),
            event_bus: self.event_bus.clone(),
        }
    }
}

impl<S: Storage> Dispatcher<S> {
    /// Create a dispatcher with the default at-least-once retry policy.
    pub fn new(storage: Arc<S>, transport: Arc<dyn Transport>) -> Self {
        Self {
            storage,
            transport,
            retry_policy: RetryPolicy::default(),
            event_bus: None,
        }
    }

    /// Set the retry policy used for at-least-once jobs.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the event bus for completion events and failure alerts.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Retry policy used for at-least-once jobs.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Run one occurrence of `job` to completion.
    ///
    /// Never fails: transport errors and error statuses end up in the returned outcome,
    /// which has already been handed to storage when this returns.
    pub async fn dispatch(&self, job: &JobRecord, occurrence: DateTime<Utc>) -> ExecutionOutcome {
        let policy = RetryPolicy::for_mode(job.delivery_mode, &self.retry_policy);
        let started = Instant::now();
        let mut attempt = 0;

        let outcome = loop {
            attempt += 1;
            let request = DeliveryRequest::new(job, occurrence, attempt);

            let (http_status, failure) = match self.transport.send(&request).await {
                Ok(status) if (200..300).contains(&status) => {
                    break ExecutionOutcome::success(
                        job.id.clone(),
                        occurrence,
                        status,
                        elapsed_millis(started),
                        attempt,
                    );
                }
                Ok(status) => (Some(status), format!("HTTP {}", status)),
                Err(e) => (None, e.to_string()),
            };

            if policy.should_retry(attempt) {
                let delay = policy.delay_after(attempt);
                warn!(
                    job_id = %job.id,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %failure,
                    "Delivery attempt failed, retrying"
                );
                sleep(delay).await;
                continue;
            }

            break ExecutionOutcome::failure(
                job.id.clone(),
                occurrence,
                http_status,
                elapsed_millis(started),
                attempt,
                failure,
            );
        };

        self.record(job, &outcome).await;
        outcome
    }

    async fn record(&self, job: &JobRecord, outcome: &ExecutionOutcome) {
        if outcome.is_success() {
            info!(
                job_id = %job.id,
                http_status = ?outcome.http_status,
                attempts = outcome.attempts,
                duration_ms = outcome.duration_millis,
                "Job execution succeeded"
            );
        } else {
            warn!(
                job_id = %job.id,
                http_status = ?outcome.http_status,
                attempts = outcome.attempts,
                duration_ms = outcome.duration_millis,
                error = ?outcome.error,
                "Job execution failed"
            );
        }

        if let Err(e) = self.storage.save_execution(outcome.clone()).await {
            error!(
                job_id = %job.id,
                execution_id = %outcome.id,
                error = %e,
                "Failed to record execution outcome"
            );
        } else {
            debug!(job_id = %job.id, execution_id = %outcome.id, "Execution outcome recorded");
        }

        if let Some(bus) = &self.event_bus {
            if !outcome.is_success() {
                bus.emit_detached(Event::execution_failed(FailureAlert::from_outcome(
                    outcome,
                    &job.target_url,
                )));
            }
            bus.emit_detached(Event::execution_completed(outcome));
        }
    }
}

fn elapsed_millis(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
