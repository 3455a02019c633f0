//! Wall-clock source used for scheduling decisions.

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time.
///
/// The scheduler asks the clock for "now" whenever it computes a next fire instant or
/// measures drift, so tests can substitute a clock that follows tokio's paused time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
