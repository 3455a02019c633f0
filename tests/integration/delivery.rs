//! Delivery integration tests.
//!
//! These tests run a scheduler against local HTTP servers in real time. Each job
//! fires once, a couple of seconds after the test starts.

use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use cronhook::{
    DeliveryMode, EventBus, HttpTransport, InMemoryStorage, JobId, JobRecord, OutcomeStatus,
    RetryPolicy, Scheduler, SchedulerHandle, WebhookAlerter,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{expression_at, wait_for_executions};

/// A whole second far enough ahead for the scheduler to arm before it passes.
fn fire_instant() -> DateTime<Utc> {
    Utc::now()
        .duration_trunc(ChronoDuration::seconds(1))
        .unwrap()
        + ChronoDuration::seconds(2)
}

async fn start(
    storage: &Arc<InMemoryStorage>,
    event_bus: EventBus,
    retry_policy: RetryPolicy,
) -> SchedulerHandle {
    let transport = HttpTransport::with_timeout(Duration::from_secs(2)).unwrap();
    let scheduler = Scheduler::with_storage(Arc::clone(storage), Arc::new(transport))
        .with_event_bus(event_bus)
        .with_retry_policy(retry_policy);
    let (handle, _task) = scheduler.start().await;
    handle
}

async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<wiremock::Request> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests.len() >= count || tokio::time::Instant::now() > deadline {
            return requests;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Test: A fired job posts its occurrence as JSON and records one success.
#[tokio::test]
async fn test_fired_job_posts_json_to_target() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header_regex("user-agent", "^cronhook/"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let storage = Arc::new(InMemoryStorage::new());
    let handle = start(&storage, EventBus::new(), RetryPolicy::default()).await;

    let occurrence = fire_instant();
    let job = JobRecord::new("post", expression_at(occurrence), format!("{}/hook", server.uri()));
    assert_eq!(handle.add_job(job).await.unwrap(), occurrence);

    let executions = wait_for_executions(
        storage.as_ref(),
        &JobId::new("post"),
        1,
        Duration::from_secs(10),
    )
    .await;
    assert_eq!(executions[0].status, OutcomeStatus::Success);
    assert_eq!(executions[0].http_status, Some(204));
    assert_eq!(executions[0].attempts, 1);
    assert_eq!(executions[0].occurrence, occurrence);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["job_id"], "post");
    assert_eq!(body["attempt"], 1);
    let sent: DateTime<Utc> = body["occurrence"].as_str().unwrap().parse().unwrap();
    assert_eq!(sent, occurrence);

    assert_eq!(handle.metrics().success_count, 1);
}

/// Test: At-least-once delivery retries failed calls within one occurrence.
#[tokio::test]
async fn test_at_least_once_retries_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let storage = Arc::new(InMemoryStorage::new());
    let policy = RetryPolicy::linear(3, Duration::from_millis(100));
    let handle = start(&storage, EventBus::new(), policy).await;

    let job = JobRecord::new("retry", expression_at(fire_instant()), server.uri());
    handle.add_job(job).await.unwrap();

    let executions = wait_for_executions(
        storage.as_ref(),
        &JobId::new("retry"),
        1,
        Duration::from_secs(10),
    )
    .await;
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, OutcomeStatus::Success);
    assert_eq!(executions[0].attempts, 3);
    // 100ms after the first attempt, 200ms after the second.
    assert!(executions[0].duration_millis >= 300);

    let attempts: Vec<u64> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| serde_json::from_slice::<Value>(&r.body).unwrap()["attempt"].as_u64().unwrap())
        .collect();
    assert_eq!(attempts, vec![1, 2, 3]);
}

/// Test: A failed no-retry job posts an alert to the alert webhook.
#[tokio::test]
async fn test_failure_alert_posted_to_webhook() {
    let target = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&target)
        .await;

    let alerts = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/alerts"))
        .and(body_partial_json(serde_json::json!({
            "job_id": "flaky",
            "http_status": 503,
            "attempts": 1
        })))
        .respond_with(ResponseTemplate::new(200))
        .mount(&alerts)
        .await;

    let event_bus = EventBus::new();
    event_bus
        .register(Arc::new(
            WebhookAlerter::new(format!("{}/alerts", alerts.uri())).unwrap(),
        ))
        .await;

    let storage = Arc::new(InMemoryStorage::new());
    let handle = start(&storage, event_bus, RetryPolicy::default()).await;

    let job = JobRecord::new("flaky", expression_at(fire_instant()), target.uri())
        .with_delivery_mode(DeliveryMode::NoRetry);
    handle.add_job(job).await.unwrap();

    let executions = wait_for_executions(
        storage.as_ref(),
        &JobId::new("flaky"),
        1,
        Duration::from_secs(10),
    )
    .await;
    assert_eq!(executions[0].status, OutcomeStatus::Failure);
    assert_eq!(executions[0].http_status, Some(503));
    assert_eq!(target.received_requests().await.unwrap().len(), 1);

    let received = wait_for_requests(&alerts, 1).await;
    assert_eq!(received.len(), 1);
    let alert: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(alert["target_url"], target.uri());

    assert_eq!(handle.metrics().failure_count, 1);
}

/// Test: An unreachable target is recorded as a failure without a status.
#[tokio::test]
async fn test_unreachable_target_recorded_as_failure() {
    // Bind and drop a listener so nothing is accepting on the port.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/hook", listener.local_addr().unwrap());
    drop(listener);

    let storage = Arc::new(InMemoryStorage::new());
    let handle = start(&storage, EventBus::new(), RetryPolicy::default()).await;

    let job = JobRecord::new("down", expression_at(fire_instant()), url)
        .with_delivery_mode(DeliveryMode::NoRetry);
    handle.add_job(job).await.unwrap();

    let executions = wait_for_executions(
        storage.as_ref(),
        &JobId::new("down"),
        1,
        Duration::from_secs(10),
    )
    .await;
    assert_eq!(executions[0].status, OutcomeStatus::Failure);
    assert_eq!(executions[0].http_status, None);
    assert_eq!(executions[0].attempts, 1);
    assert!(executions[0].error.is_some());
}
