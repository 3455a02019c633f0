//! Testing utilities for users of the cronhook library.
//!
//! This module provides helpers for testing schedules and deliveries without a network
//! or a real clock:
//!
//! - [`ScriptedTransport`]: A transport that replays scripted responses and records requests
//! - [`RecordingHandler`]: An event handler that keeps every event it receives
//! - [`TokioClock`]: A wall clock that follows tokio's (pausable) time

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::core::clock::Clock;
use crate::events::{Event, EventHandler};
use crate::execution::{DeliveryRequest, Transport, TransportError};

/// A transport that replays a script of responses.
///
/// Each call pops the next scripted result; once the script is exhausted every call
/// answers `200`. All requests are recorded for later inspection. With a delay set,
/// every answer arrives that long after the request.
///
/// # Example
///
/// ```
/// use cronhook::testing::ScriptedTransport;
///
/// let transport = ScriptedTransport::new([Ok(500), Ok(200)]);
/// assert_eq!(transport.request_count(), 0);
/// ```
pub struct ScriptedTransport {
    script: StdMutex<VecDeque<Result<u16, TransportError>>>,
    requests: StdMutex<Vec<DeliveryRequest>>,
    delay: Duration,
}

impl ScriptedTransport {
    /// Create a transport with the given script.
    pub fn new(script: impl IntoIterator<Item = Result<u16, TransportError>>) -> Self {
        Self {
            script: StdMutex::new(script.into_iter().collect()),
            requests: StdMutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    /// Create a transport that always answers `200`.
    pub fn always_ok() -> Self {
        Self::new([])
    }

    /// Answer every request only after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Append a result to the script.
    pub fn push(&self, result: Result<u16, TransportError>) {
        self.script.lock().unwrap_or_else(PoisonError::into_inner).push_back(result);
    }

    /// All requests received so far, in order.
    pub fn requests(&self) -> Vec<DeliveryRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &DeliveryRequest) -> Result<u16, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Ok(200))
    }
}

/// An event handler that records every event it receives.
pub struct RecordingHandler {
    events: Mutex<Vec<Event>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// All events received so far, in order.
    pub async fn events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }

    /// Wait until at least `count` events were received, giving up after five seconds.
    pub async fn wait_for(&self, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.events.lock().await.len() < count && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

impl Default for RecordingHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &Event) {
        self.events.lock().await.push(event.clone());
    }
}

/// A wall clock driven by tokio's clock.
///
/// Reports a fixed starting instant plus the tokio time elapsed since construction, so
/// under `#[tokio::test(start_paused = true)]` wall-clock readings advance exactly as
/// far as paused time does.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: DateTime<Utc>,
    started: Instant,
}

impl TokioClock {
    /// Start the clock at the current system time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Start the clock at a fixed instant.
    pub fn starting_at(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            started: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.origin + elapsed
    }
}
