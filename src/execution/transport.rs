//! Outbound transport for job occurrences.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::core::job::JobRecord;
use crate::core::types::JobId;

/// User agent sent with every outbound call.
pub const USER_AGENT: &str = concat!("cronhook/", env!("CARGO_PKG_VERSION"));

/// Default timeout for one outbound call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised by a transport before any HTTP status was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The call did not complete within the timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The target could not be reached.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The target URL is not usable.
    #[error("invalid target url: {0}")]
    InvalidUrl(String),

    /// Any other transport failure.
    #[error("request failed: {0}")]
    Request(String),
}

/// One outbound call for a job occurrence.
///
/// Serializes to the JSON body `{"job_id", "occurrence", "attempt"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryRequest {
    pub job_id: JobId,
    #[serde(skip)]
    pub target_url: String,
    pub occurrence: DateTime<Utc>,
    /// Attempt number, starting at 1.
    pub attempt: u32,
}

impl DeliveryRequest {
    pub fn new(job: &JobRecord, occurrence: DateTime<Utc>, attempt: u32) -> Self {
        Self {
            job_id: job.id.clone(),
            target_url: job.target_url.clone(),
            occurrence,
            attempt,
        }
    }
}

/// Sends delivery requests and reports the HTTP status received.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one call. Any status code is `Ok`; only failures to get a response are errors.
    async fn send(&self, request: &DeliveryRequest) -> Result<u16, TransportError>;
}

/// HTTP transport backed by `reqwest`: one `POST` per attempt.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with the default timeout.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a transport with a custom per-call timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_builder() {
            TransportError::InvalidUrl(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &DeliveryRequest) -> Result<u16, TransportError> {
        let response = self
            .client
            .post(&request.target_url)
            .json(request)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }
}
