//! Per-job timer tasks.
//!
//! Each armed job owns one tokio task that sleeps until the job's next fire instant and
//! then notifies the scheduler. Sleeps longer than the maximum single-timer delay are
//! split: the timer sleeps for the maximum, reads the clock again and sleeps for what
//! remains.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::clock::Clock;
use crate::core::types::JobId;

/// Largest delay a single timer sleeps for (the signed 32-bit millisecond limit).
pub const DEFAULT_MAX_TIMER_DELAY: Duration = Duration::from_secs(2_147_483);

/// Notification sent by a timer when its fire instant is reached.
#[derive(Debug)]
pub(crate) struct TimerFired {
    pub(crate) job_id: JobId,
    pub(crate) generation: u64,
    pub(crate) fired_at: DateTime<Utc>,
}

/// What a timer does next, given the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerStep {
    /// The fire instant has been reached.
    Due,
    /// Sleep until the fire instant.
    Wait(Duration),
    /// Sleep for the maximum delay, then re-evaluate.
    Chain(Duration),
}

pub(crate) fn timer_step(
    now: DateTime<Utc>,
    fire_at: DateTime<Utc>,
    max_delay: Duration,
) -> TimerStep {
    let remaining = match (fire_at - now).to_std() {
        Ok(remaining) if !remaining.is_zero() => remaining,
        _ => return TimerStep::Due,
    };

    if remaining > max_delay {
        TimerStep::Chain(max_delay)
    } else {
        TimerStep::Wait(remaining)
    }
}

/// Counts live timer tasks; decremented when the task ends or is aborted.
struct LiveTimer(Arc<AtomicUsize>);

impl LiveTimer {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveTimer {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Everything a timer task needs besides its target.
#[derive(Clone)]
pub(crate) struct TimerContext {
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) max_delay: Duration,
    pub(crate) fired_tx: mpsc::UnboundedSender<TimerFired>,
    pub(crate) live_timers: Arc<AtomicUsize>,
}

impl TimerContext {
    /// Spawn a timer for one occurrence of `job_id`.
    pub(crate) fn arm(
        &self,
        job_id: JobId,
        generation: u64,
        fire_at: DateTime<Utc>,
    ) -> JoinHandle<()> {
        let guard = LiveTimer::new(&self.live_timers);
        let clock = Arc::clone(&self.clock);
        let max_delay = self.max_delay;
        let fired_tx = self.fired_tx.clone();

        tokio::spawn(async move {
            let _guard = guard;
            loop {
                match timer_step(clock.now(), fire_at, max_delay) {
                    TimerStep::Due => break,
                    TimerStep::Wait(delay) => tokio::time::sleep(delay).await,
                    TimerStep::Chain(delay) => {
                        tracing::debug!(
                            job_id = %job_id,
                            fire_at = %fire_at,
                            delay_secs = delay.as_secs(),
                            "Timer delay capped, chaining"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }

            // The receiver only goes away when the scheduler has shut down.
            let _ = fired_tx.send(TimerFired {
                job_id,
                generation,
                fired_at: clock.now(),
            });
        })
    }
}

/// Cancel a timer and wait until its task is gone.
pub(crate) async fn cancel(timer: JoinHandle<()>) {
    timer.abort();
    let _ = timer.await;
}
