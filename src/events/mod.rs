//! Lifecycle events and event handling.
//!
//! This module provides event emission for scheduling and delivery events.
//! Failure alerts travel on the same bus as [`Event::ExecutionFailed`].

mod alerts;

pub use alerts::{AlertLogger, WebhookAlerter};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::core::outcome::ExecutionOutcome;
use crate::core::types::{ExecutionId, JobId};

/// Details of a failed occurrence, as delivered to alert sinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureAlert {
    pub job_id: JobId,
    pub target_url: String,
    /// HTTP status of the last attempt, when a response was received.
    pub http_status: Option<u16>,
    pub error: String,
    pub attempts: u32,
    /// Scheduled instant of the failed occurrence.
    pub occurrence: DateTime<Utc>,
    /// When the failure was detected.
    pub timestamp: DateTime<Utc>,
}

impl FailureAlert {
    /// Build an alert from a failed outcome.
    pub fn from_outcome(outcome: &ExecutionOutcome, target_url: impl Into<String>) -> Self {
        Self {
            job_id: outcome.job_id.clone(),
            target_url: target_url.into(),
            http_status: outcome.http_status,
            error: outcome.error.clone().unwrap_or_default(),
            attempts: outcome.attempts,
            occurrence: outcome.occurrence,
            timestamp: Utc::now(),
        }
    }
}

/// Lifecycle events emitted by the scheduler and dispatcher.
#[derive(Debug, Clone)]
pub enum Event {
    /// A timer was armed for a job's next occurrence.
    JobScheduled {
        job_id: JobId,
        next_fire: DateTime<Utc>,
        timestamp: Instant,
    },

    /// A job's timer fired and the occurrence was handed to the dispatcher.
    JobFired {
        job_id: JobId,
        occurrence: DateTime<Utc>,
        /// Lateness of the fire relative to the scheduled instant, clamped at zero.
        drift: Duration,
        timestamp: Instant,
    },

    /// An occurrence finished, successfully or not, and its outcome was recorded.
    ExecutionCompleted {
        job_id: JobId,
        execution_id: ExecutionId,
        success: bool,
        attempts: u32,
        duration: Duration,
        timestamp: Instant,
    },

    /// An occurrence failed after all attempts.
    ExecutionFailed {
        alert: FailureAlert,
        timestamp: Instant,
    },
}

impl Event {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> Instant {
        match self {
            Event::JobScheduled { timestamp, .. } => *timestamp,
            Event::JobFired { timestamp, .. } => *timestamp,
            Event::ExecutionCompleted { timestamp, .. } => *timestamp,
            Event::ExecutionFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job the event concerns.
    pub fn job_id(&self) -> &JobId {
        match self {
            Event::JobScheduled { job_id, .. } => job_id,
            Event::JobFired { job_id, .. } => job_id,
            Event::ExecutionCompleted { job_id, .. } => job_id,
            Event::ExecutionFailed { alert, .. } => &alert.job_id,
        }
    }

    /// Create a JobScheduled event.
    pub fn job_scheduled(job_id: JobId, next_fire: DateTime<Utc>) -> Self {
        Event::JobScheduled {
            job_id,
            next_fire,
            timestamp: Instant::now(),
        }
    }

    /// Create a JobFired event.
    pub fn job_fired(job_id: JobId, occurrence: DateTime<Utc>, drift: Duration) -> Self {
        Event::JobFired {
            job_id,
            occurrence,
            drift,
            timestamp: Instant::now(),
        }
    }

    /// Create an ExecutionCompleted event from a recorded outcome.
    pub fn execution_completed(outcome: &ExecutionOutcome) -> Self {
        Event::ExecutionCompleted {
            job_id: outcome.job_id.clone(),
            execution_id: outcome.id,
            success: outcome.is_success(),
            attempts: outcome.attempts,
            duration: Duration::from_millis(outcome.duration_millis),
            timestamp: Instant::now(),
        }
    }

    /// Create an ExecutionFailed event.
    pub fn execution_failed(alert: FailureAlert) -> Self {
        Event::ExecutionFailed {
            alert,
            timestamp: Instant::now(),
        }
    }
}

/// Handler for receiving lifecycle events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &Event);
}

/// Event bus for distributing events to registered handlers.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register an event handler.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
    }

    /// Emit an event to all registered handlers.
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            handler.handle(&event).await;
        }
    }

    /// Emit an event on a background task.
    ///
    /// The caller never waits for handlers, so a slow alert sink cannot delay it.
    pub fn emit_detached(self: &Arc<Self>, event: Event) {
        let bus = Arc::clone(self);
        tokio::spawn(async move {
            bus.emit(event).await;
        });
    }

    /// Get the number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
