//! Running execution counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Snapshot of a scheduler's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerMetrics {
    /// Occurrences fired since the scheduler was created.
    pub total_executions: u64,
    /// Occurrences whose dispatch ended in success.
    pub success_count: u64,
    /// Occurrences whose dispatch ended in failure.
    pub failure_count: u64,
    /// Mean lateness of fires, in milliseconds. Early fires count as zero.
    pub average_drift_millis: f64,
}

/// Lock-free recorder behind [`SchedulerMetrics`].
#[derive(Debug, Default)]
pub(crate) struct MetricsRecorder {
    total_executions: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    drift_total_millis: AtomicU64,
}

impl MetricsRecorder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record one fired occurrence and its (already clamped) drift.
    pub(crate) fn record_fire(&self, drift: Duration) {
        self.drift_total_millis
            .fetch_add(drift.as_millis() as u64, Ordering::Relaxed);
        self.total_executions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the final result of a dispatch.
    pub(crate) fn record_outcome(&self, success: bool) {
        if success {
            self.success_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> SchedulerMetrics {
        let total_executions = self.total_executions.load(Ordering::Relaxed);
        let drift_total = self.drift_total_millis.load(Ordering::Relaxed);
        let average_drift_millis = if total_executions == 0 {
            0.0
        } else {
            drift_total as f64 / total_executions as f64
        };

        SchedulerMetrics {
            total_executions,
            success_count: self.success_count.load(Ordering::Relaxed),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            average_drift_millis,
        }
    }
}
