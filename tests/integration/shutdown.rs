//! Stop and shutdown integration tests.
//!
//! Stopping cancels timers but never cancels a delivery already in flight.

use chrono::{DurationRound, TimeZone, Utc};
use cronhook::testing::{ScriptedTransport, TokioClock};
use cronhook::{
    DeliveryMode, HttpTransport, InMemoryStorage, JobId, JobRecord, OutcomeStatus, Scheduler,
    SchedulerError, SchedulerState, Storage,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{expression_at, wait_for_executions};

async fn execution_count(storage: &InMemoryStorage, job_id: &str) -> usize {
    storage
        .list_executions(&JobId::new(job_id), usize::MAX)
        .await
        .unwrap()
        .len()
}

/// Test: Stop cancels pending fires and start picks the jobs up again.
#[tokio::test(start_paused = true)]
async fn test_stop_then_start_resumes_schedule() {
    let storage = Arc::new(InMemoryStorage::new());
    storage
        .save_job(JobRecord::new(
            "tick",
            "0,5,10,15,20,25,30,35,40,45,50,55 * * * * *",
            "http://target/tick",
        ))
        .await
        .unwrap();

    let origin = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    let scheduler =
        Scheduler::with_storage(Arc::clone(&storage), Arc::new(ScriptedTransport::always_ok()))
            .with_clock(Arc::new(TokioClock::starting_at(origin)));
    let (handle, _task) = scheduler.start().await;

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(execution_count(&storage, "tick").await, 1);

    handle.stop().await.unwrap();
    assert_eq!(handle.state().await, SchedulerState::Stopped);
    assert_eq!(handle.live_timers(), 0);
    assert!(handle.scheduled_jobs().await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(execution_count(&storage, "tick").await, 1);

    let result = handle
        .add_job(JobRecord::new("other", "* * * * * *", "http://target/other"))
        .await;
    assert!(matches!(result, Err(SchedulerError::NotRunning)));

    // 08:00:26 now; next fire at 08:00:30.
    assert_eq!(handle.start().await.unwrap(), 1);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(execution_count(&storage, "tick").await, 2);
    assert_eq!(handle.metrics().total_executions, 2);
}

/// Test: Dropping every handle stops the scheduler task.
#[tokio::test(start_paused = true)]
async fn test_dropping_handles_ends_scheduler() {
    let storage = Arc::new(InMemoryStorage::new());
    storage
        .save_job(JobRecord::new("tick", "* * * * * *", "http://target/tick"))
        .await
        .unwrap();

    let scheduler =
        Scheduler::with_storage(Arc::clone(&storage), Arc::new(ScriptedTransport::always_ok()))
            .with_clock(Arc::new(TokioClock::new()));
    let (handle, task) = scheduler.start().await;

    drop(handle);
    task.await.unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(execution_count(&storage, "tick").await, 0);
}

/// Test: A delivery in flight at shutdown still records its outcome.
#[tokio::test]
async fn test_in_flight_delivery_completes_after_shutdown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let storage = Arc::new(InMemoryStorage::new());
    let transport = HttpTransport::with_timeout(Duration::from_secs(5)).unwrap();
    let scheduler = Scheduler::with_storage(Arc::clone(&storage), Arc::new(transport));
    let (handle, task) = scheduler.start().await;

    let fire_at = Utc::now()
        .duration_trunc(chrono::Duration::seconds(1))
        .unwrap()
        + chrono::Duration::seconds(2);
    let job = JobRecord::new("slow", expression_at(fire_at), server.uri())
        .with_delivery_mode(DeliveryMode::NoRetry);
    handle.add_job(job).await.unwrap();

    // Wait for the fire, then shut down while the response is still delayed.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while handle.metrics().total_executions == 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(handle.metrics().total_executions, 1);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
    assert_eq!(execution_count(&storage, "slow").await, 0);

    let executions = wait_for_executions(
        storage.as_ref(),
        &JobId::new("slow"),
        1,
        Duration::from_secs(5),
    )
    .await;
    assert_eq!(executions[0].status, OutcomeStatus::Success);
    assert_eq!(handle.metrics().success_count, 1);
}
