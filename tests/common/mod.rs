//! Common test utilities shared across integration tests.

use axum::body::Body;
use axum::http::{Request, Response};
use chrono::{DateTime, Datelike, Timelike, Utc};
use cronhook::{ExecutionOutcome, JobId, Storage};
use http_body_util::BodyExt;
use serde_json::Value;
use std::time::Duration;

/// Wait until a job has at least `count` recorded executions, polling storage.
///
/// This is more reliable than fixed sleeps since delivery time can vary.
/// Polls storage every 10ms and times out after the specified duration.
///
/// # Panics
///
/// Panics if the timeout is reached before enough executions are recorded.
pub async fn wait_for_executions(
    storage: &dyn Storage,
    job_id: &JobId,
    count: usize,
    timeout: Duration,
) -> Vec<ExecutionOutcome> {
    let start = tokio::time::Instant::now();
    loop {
        let executions = storage.list_executions(job_id, usize::MAX).await.unwrap();
        if executions.len() >= count {
            return executions;
        }
        if start.elapsed() > timeout {
            panic!(
                "Timeout waiting for {} executions of {}, recorded: {}",
                count,
                job_id,
                executions.len()
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Expression that fires once a year, at the whole second of `instant`.
pub fn expression_at(instant: DateTime<Utc>) -> String {
    format!(
        "{} {} {} {} {} *",
        instant.second(),
        instant.minute(),
        instant.hour(),
        instant.day(),
        instant.month()
    )
}

/// Expression that never fires within a test run.
pub const YEARLY: &str = "0 0 0 1 1 *";

/// Build a request with an optional JSON body.
pub fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Collect a response body as JSON.
pub async fn json_body(response: Response<Body>) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}
