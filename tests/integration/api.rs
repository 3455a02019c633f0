//! API integration tests.
//!
//! These tests drive the router with a running scheduler and in-memory storage.
//! Jobs use yearly schedules so no timer fires while a test runs.

use cronhook::api::{ApiState, build_router, create_api_state};
use cronhook::testing::ScriptedTransport;
use cronhook::{
    DeliveryMode, ExecutionOutcome, InMemoryStorage, JobId, JobRecord, Scheduler, Storage,
};

use axum::http::StatusCode;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use crate::common::{YEARLY, json_body, request};

/// Create a test API state with one stored job.
async fn create_test_state() -> (ApiState<InMemoryStorage>, Arc<InMemoryStorage>) {
    let storage = Arc::new(InMemoryStorage::new());
    storage
        .save_job(
            JobRecord::new("test_job", YEARLY, "http://localhost:9/hook").with_name("Test Job"),
        )
        .await
        .unwrap();

    let scheduler =
        Scheduler::with_storage(Arc::clone(&storage), Arc::new(ScriptedTransport::always_ok()));
    let (handle, _task) = scheduler.start().await;

    (create_api_state(handle, Arc::clone(&storage)), storage)
}

/// Test: Health endpoint responds with status ok.
#[tokio::test]
async fn test_health_endpoint() {
    let (state, _) = create_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(request("GET", "/api/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

/// Test: Scheduler state endpoint reflects start and stop.
#[tokio::test]
async fn test_scheduler_start_stop_endpoints() {
    let (state, _) = create_test_state().await;
    let router = build_router(state);

    let response = router
        .clone()
        .oneshot(request("GET", "/api/scheduler/state", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["state"], "running");
    assert_eq!(json["is_running"], true);

    let response = router
        .clone()
        .oneshot(request("POST", "/api/scheduler/stop", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(request("GET", "/api/metrics", None))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["scheduled_jobs"], 0);
    assert_eq!(json["live_timers"], 0);

    let response = router
        .clone()
        .oneshot(request("POST", "/api/scheduler/start", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(request("GET", "/api/scheduler/state", None))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["state"], "running");
}

/// Test: List jobs endpoint returns active jobs with their next fire instants.
#[tokio::test]
async fn test_list_jobs_endpoint() {
    let (state, _) = create_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(request("GET", "/api/jobs", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["jobs"][0]["id"], "test_job");
    assert_eq!(json["jobs"][0]["name"], "Test Job");
    assert_eq!(json["jobs"][0]["delivery_mode"], "AT_LEAST_ONCE");
    assert!(json["jobs"][0]["next_fire"].is_string());
}

/// Test: Get specific job by ID.
#[tokio::test]
async fn test_get_job_endpoint() {
    let (state, _) = create_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(request("GET", "/api/jobs/test_job", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["id"], "test_job");
    assert_eq!(json["schedule"], YEARLY);
    assert_eq!(json["status"], "active");
}

/// Test: Get non-existent job returns 404.
#[tokio::test]
async fn test_get_job_not_found() {
    let (state, _) = create_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(request("GET", "/api/jobs/nonexistent", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = json_body(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

/// Test: Creating a job persists and schedules it.
#[tokio::test]
async fn test_create_job() {
    let (state, storage) = create_test_state().await;
    let router = build_router(state);

    let body = json!({
        "id": "nightly",
        "name": "Nightly export",
        "schedule": "0 0 2 * * *",
        "target_url": "http://localhost:9/export",
        "delivery_mode": "NO_RETRY"
    });
    let response = router
        .clone()
        .oneshot(request("POST", "/api/jobs", Some(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert_eq!(json["id"], "nightly");
    assert_eq!(json["delivery_mode"], "NO_RETRY");
    assert!(json["next_fire"].as_str().unwrap().contains("T02:00:00"));

    let stored = storage.get_job(&JobId::new("nightly")).await.unwrap();
    assert_eq!(stored.name, "Nightly export");
    assert_eq!(stored.delivery_mode, DeliveryMode::NoRetry);

    let response = router
        .oneshot(request("GET", "/api/metrics", None))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["scheduled_jobs"], 2);
    assert_eq!(json["live_timers"], 2);
}

/// Test: Creating a job without an id generates one.
#[tokio::test]
async fn test_create_job_generates_id() {
    let (state, _) = create_test_state().await;
    let router = build_router(state);

    let body = json!({ "schedule": YEARLY, "target_url": "http://localhost:9/hook" });
    let response = router
        .oneshot(request("POST", "/api/jobs", Some(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    let id = json["id"].as_str().unwrap();
    assert!(!id.is_empty());
    assert_eq!(json["name"], id);
    assert_eq!(json["delivery_mode"], "AT_LEAST_ONCE");
}

/// Test: A malformed expression is rejected and nothing is stored.
#[tokio::test]
async fn test_create_job_malformed_expression() {
    let (state, storage) = create_test_state().await;
    let router = build_router(state);

    let body = json!({ "id": "bad", "schedule": "* * * * *", "target_url": "http://localhost:9/" });
    let response = router
        .oneshot(request("POST", "/api/jobs", Some(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["code"], "MALFORMED_EXPRESSION");
    assert!(storage.get_job(&JobId::new("bad")).await.is_err());
}

/// Test: An expression that never fires is rejected.
#[tokio::test]
async fn test_create_job_without_occurrence() {
    let (state, _) = create_test_state().await;
    let router = build_router(state);

    let body = json!({
        "id": "feb31",
        "schedule": "0 0 0 31 2 *",
        "target_url": "http://localhost:9/"
    });
    let response = router
        .oneshot(request("POST", "/api/jobs", Some(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(response).await;
    assert_eq!(json["code"], "NO_EXECUTION_FOUND");
}

/// Test: Invalid target URLs are rejected.
#[tokio::test]
async fn test_create_job_invalid_target() {
    let (state, _) = create_test_state().await;
    let router = build_router(state);

    let body = json!({ "id": "ftp", "schedule": YEARLY, "target_url": "ftp://files.local/" });
    let response = router
        .oneshot(request("POST", "/api/jobs", Some(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}

/// Test: A duplicate id is a conflict.
#[tokio::test]
async fn test_create_duplicate_job() {
    let (state, _) = create_test_state().await;
    let router = build_router(state);

    let body = json!({ "id": "test_job", "schedule": YEARLY, "target_url": "http://localhost:9/" });
    let response = router
        .oneshot(request("POST", "/api/jobs", Some(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = json_body(response).await;
    assert_eq!(json["code"], "CONFLICT");
}

/// Test: A job created while the scheduler is stopped is stored but not armed.
#[tokio::test]
async fn test_create_job_while_stopped() {
    let (state, storage) = create_test_state().await;
    state.handle.stop().await.unwrap();
    let router = build_router(state);

    let body = json!({ "id": "later", "schedule": YEARLY, "target_url": "http://localhost:9/" });
    let response = router
        .oneshot(request("POST", "/api/jobs", Some(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert!(json["next_fire"].is_null());
    assert!(storage.get_job(&JobId::new("later")).await.is_ok());
}

/// Test: A create the scheduler cannot take leaves no active record behind.
#[tokio::test]
async fn test_create_job_when_scheduler_gone() {
    let (state, storage) = create_test_state().await;
    state.handle.shutdown().await.unwrap();
    let router = build_router(state);

    let body = json!({
        "id": "orphan",
        "schedule": YEARLY,
        "target_url": "http://localhost:9/orphan"
    });
    let response = router
        .oneshot(request("POST", "/api/jobs", Some(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let stored = storage.get_job(&JobId::new("orphan")).await.unwrap();
    assert!(!stored.is_active());
    let active = storage.list_active_jobs().await.unwrap();
    assert!(active.iter().all(|job| job.id.as_str() != "orphan"));
}

/// Test: Updating a job reschedules it.
#[tokio::test]
async fn test_update_job() {
    let (state, storage) = create_test_state().await;
    let router = build_router(state);

    let body = json!({ "schedule": "0 30 12 * * *", "name": "Renamed" });
    let response = router
        .oneshot(request("PATCH", "/api/jobs/test_job", Some(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["schedule"], "0 30 12 * * *");
    assert_eq!(json["name"], "Renamed");
    assert!(json["next_fire"].as_str().unwrap().contains("T12:30:00"));

    let stored = storage.get_job(&JobId::new("test_job")).await.unwrap();
    assert_eq!(stored.schedule, "0 30 12 * * *");
}

/// Test: A malformed update leaves the job untouched.
#[tokio::test]
async fn test_update_job_malformed_expression() {
    let (state, storage) = create_test_state().await;
    let router = build_router(state);

    let body = json!({ "schedule": "61 * * * * *" });
    let response = router
        .oneshot(request("PATCH", "/api/jobs/test_job", Some(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["code"], "MALFORMED_EXPRESSION");

    let stored = storage.get_job(&JobId::new("test_job")).await.unwrap();
    assert_eq!(stored.schedule, YEARLY);
}

/// Test: Updating a job that is not scheduled is rejected.
#[tokio::test]
async fn test_update_unscheduled_job() {
    let (state, _) = create_test_state().await;
    let router = build_router(state);

    let body = json!({ "name": "Ghost" });
    let response = router
        .oneshot(request("PATCH", "/api/jobs/ghost", Some(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = json_body(response).await;
    assert_eq!(json["code"], "JOB_NOT_ACTIVE");
}

/// Test: An empty update is a bad request.
#[tokio::test]
async fn test_update_job_empty_body() {
    let (state, _) = create_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(request("PATCH", "/api/jobs/test_job", Some(json!({}))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Test: Deleting a job soft-deletes and unschedules it.
#[tokio::test]
async fn test_delete_job() {
    let (state, storage) = create_test_state().await;
    let router = build_router(state);

    let response = router
        .clone()
        .oneshot(request("DELETE", "/api/jobs/test_job", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "deleted");
    assert!(json["next_fire"].is_null());

    let stored = storage.get_job(&JobId::new("test_job")).await.unwrap();
    assert!(!stored.is_active());

    let response = router
        .clone()
        .oneshot(request("GET", "/api/jobs", None))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["count"], 0);

    let response = router
        .oneshot(request("GET", "/api/metrics", None))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["live_timers"], 0);
}

/// Test: Deleting a non-existent job returns 404.
#[tokio::test]
async fn test_delete_job_not_found() {
    let (state, _) = create_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(request("DELETE", "/api/jobs/nonexistent", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Test: Executions are listed most recent first and honour the limit.
#[tokio::test]
async fn test_list_executions() {
    let (state, storage) = create_test_state().await;
    let router = build_router(state);

    let job_id = JobId::new("test_job");
    let base = Utc::now();
    for minutes in 0..3 {
        let occurrence = base + chrono::Duration::minutes(minutes);
        storage
            .save_execution(ExecutionOutcome::success(job_id.clone(), occurrence, 200, 5, 1))
            .await
            .unwrap();
    }

    let response = router
        .clone()
        .oneshot(request("GET", "/api/jobs/test_job/executions?limit=2", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["executions"][0]["status"], "success");
    assert_eq!(json["executions"][0]["http_status"], 200);
    let first = json["executions"][0]["occurrence"].as_str().unwrap().to_string();
    let second = json["executions"][1]["occurrence"].as_str().unwrap().to_string();
    assert!(first > second);

    let response = router
        .oneshot(request("GET", "/api/jobs/unknown/executions", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
