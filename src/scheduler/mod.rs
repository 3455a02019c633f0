//! Scheduler engine for job execution.
//!
//! This module arms one timer per active job, fires occurrences into the
//! dispatcher and keeps the running execution metrics.

mod engine;
mod handle;
mod metrics;
mod timer;
mod types;

pub use engine::Scheduler;
pub use handle::SchedulerHandle;
pub use metrics::SchedulerMetrics;
pub use timer::DEFAULT_MAX_TIMER_DELAY;
pub use types::{ScheduledJob, SchedulerError, SchedulerState};
