//! Retry policy for outbound deliveries.
//!
//! Supports fixed and linear backoff with a bounded number of attempts.

use std::time::Duration;

use super::job::DeliveryMode;

/// How the wait between attempts grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backoff {
    /// Wait `base_delay` before every retry.
    Fixed,
    /// Wait `attempt × base_delay` after the attempt numbered `attempt` (1-indexed).
    #[default]
    Linear,
}

/// Retry policy for one occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one (1 = no retries).
    pub max_attempts: u32,

    /// Base delay between attempts.
    pub base_delay: Duration,

    /// Growth of the delay between attempts.
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Default attempt budget for at-least-once delivery.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// Default base delay for at-least-once delivery.
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

    /// Create a policy with a single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            backoff: Backoff::Fixed,
        }
    }

    /// Create a policy with fixed delay retries.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            backoff: Backoff::Fixed,
        }
    }

    /// Create a policy whose delay grows linearly with the attempt number.
    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff: Backoff::Linear,
        }
    }

    /// Policy to use for a job's delivery mode.
    ///
    /// `at_least_once` is the configured policy for retrying jobs; no-retry jobs
    /// always get a single attempt.
    pub fn for_mode(mode: DeliveryMode, at_least_once: &RetryPolicy) -> Self {
        match mode {
            DeliveryMode::AtLeastOnce => at_least_once.clone(),
            DeliveryMode::NoRetry => Self::none(),
        }
    }

    /// Check if retries are enabled.
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 1
    }

    /// Check if another attempt is allowed after `attempts` have been made.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Delay to wait after the failed attempt numbered `attempt` (1-indexed).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Linear => self.base_delay.saturating_mul(attempt.max(1)),
        }
    }
}

impl Default for RetryPolicy {
    /// Three attempts with a linear one-second backoff.
    fn default() -> Self {
        Self::linear(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_BASE_DELAY)
    }
}
