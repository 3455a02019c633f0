//! API request handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::job::{JobRecord, JobUpdate};
use crate::core::schedule::Schedule;
use crate::core::types::JobId;
use crate::scheduler::{SchedulerError, SchedulerHandle};
use crate::storage::Storage;

use super::errors::ApiError;
use super::responses::{
    CreateJobRequest, ExecutionListResponse, ExecutionResponse, HealthResponse, JobListResponse,
    JobResponse, MessageResponse, MetricsResponse, SchedulerStateResponse,
};

/// Shared application state for API handlers.
pub struct ApiState<S: Storage> {
    pub handle: SchedulerHandle,
    pub storage: Arc<S>,
}

impl<S: Storage> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: Storage> ApiState<S> {
    /// Next fire instants of every scheduled job.
    async fn next_fires(&self) -> Result<HashMap<JobId, DateTime<Utc>>, ApiError> {
        let scheduled = self.handle.scheduled_jobs().await?;
        Ok(scheduled
            .into_iter()
            .map(|entry| (entry.job_id, entry.next_fire))
            .collect())
    }

    async fn next_fire(&self, job_id: &JobId) -> Result<Option<DateTime<Utc>>, ApiError> {
        Ok(self.next_fires().await?.remove(job_id))
    }
}

/// Query parameters for the list_executions endpoint.
#[derive(Debug, Deserialize)]
pub struct ListExecutionsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

fn validate_target_url(url: &str) -> Result<(), ApiError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| ApiError::BadRequest(format!("invalid target_url '{}': {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ApiError::BadRequest(format!(
            "unsupported target_url scheme: {}",
            scheme
        ))),
    }
}

/// Reject expressions that do not parse or that never fire.
fn validate_schedule(expression: &str) -> Result<(), ApiError> {
    Schedule::new(expression)?.next_after(Utc::now())?;
    Ok(())
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Get scheduler state.
pub async fn get_scheduler_state<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
) -> Json<SchedulerStateResponse> {
    let scheduler_state = state.handle.state().await;
    Json(SchedulerStateResponse::from(scheduler_state))
}

/// Start the scheduler, loading active jobs from storage.
pub async fn start_scheduler<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let scheduled = state.handle.start().await?;
    Ok(Json(MessageResponse {
        message: format!("scheduler running with {} jobs", scheduled),
    }))
}

/// Stop the scheduler, cancelling every timer.
pub async fn stop_scheduler<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.handle.stop().await?;
    Ok(Json(MessageResponse {
        message: "scheduler stopped".to_string(),
    }))
}

/// Execution counters.
pub async fn get_metrics<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
) -> Result<Json<MetricsResponse>, ApiError> {
    let scheduled_jobs = state.handle.scheduled_jobs().await?.len();
    Ok(Json(MetricsResponse {
        metrics: state.handle.metrics(),
        scheduled_jobs,
        live_timers: state.handle.live_timers(),
    }))
}

/// List active jobs with their next fire instants.
pub async fn list_jobs<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
) -> Result<Json<JobListResponse>, ApiError> {
    let mut next_fires = state.next_fires().await?;
    let jobs: Vec<JobResponse> = state
        .storage
        .list_active_jobs()
        .await?
        .into_iter()
        .map(|job| {
            let next_fire = next_fires.remove(&job.id);
            JobResponse::new(job, next_fire)
        })
        .collect();
    let count = jobs.len();
    Ok(Json(JobListResponse { jobs, count }))
}

/// Create a job and schedule it.
///
/// A job the scheduler rejects is left in storage as deleted.
pub async fn create_job<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobResponse>), ApiError> {
    validate_schedule(&request.schedule)?;
    validate_target_url(&request.target_url)?;

    let id = match request.id {
        Some(id) if id.trim().is_empty() => {
            return Err(ApiError::BadRequest("job id cannot be empty".to_string()));
        }
        Some(id) => JobId::new(id),
        None => JobId::generate(),
    };

    let mut job = JobRecord::new(id, request.schedule, request.target_url)
        .with_delivery_mode(request.delivery_mode);
    if let Some(name) = request.name {
        job = job.with_name(name);
    }

    state.storage.save_job(job.clone()).await?;

    let next_fire = match state.handle.add_job(job.clone()).await {
        Ok(next_fire) => Some(next_fire),
        // Persisted; picked up by the next start.
        Err(SchedulerError::NotRunning) => None,
        Err(e) => {
            // Keep the record, but never let a later start schedule it.
            if let Err(delete_err) = state.storage.delete_job(&job.id).await {
                tracing::warn!(
                    job_id = %job.id,
                    error = %delete_err,
                    "Failed to deactivate job after scheduling error"
                );
            }
            return Err(e.into());
        }
    };

    Ok((StatusCode::CREATED, Json(JobResponse::new(job, next_fire))))
}

/// Get a specific job.
pub async fn get_job<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let job_id = JobId::new(job_id);
    let job = state.storage.get_job(&job_id).await?;
    let next_fire = state.next_fire(&job_id).await?;
    Ok(Json(JobResponse::new(job, next_fire)))
}

/// Update a scheduled job and reschedule it.
pub async fn update_job<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
    Path(job_id): Path<String>,
    Json(update): Json<JobUpdate>,
) -> Result<Json<JobResponse>, ApiError> {
    if update.is_empty() {
        return Err(ApiError::BadRequest("update changes nothing".to_string()));
    }
    if let Some(url) = &update.target_url {
        validate_target_url(url)?;
    }

    let job_id = JobId::new(job_id);
    let job = state.handle.update_job(job_id.clone(), update).await?;
    let next_fire = state.next_fire(&job_id).await?;
    Ok(Json(JobResponse::new(job, next_fire)))
}

/// Soft-delete a job and unschedule it.
pub async fn delete_job<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let job_id = JobId::new(job_id);
    let job = state.storage.delete_job(&job_id).await?;
    state.handle.remove_job(job_id).await?;
    Ok(Json(JobResponse::new(job, None)))
}

/// List recorded executions for a job, most recent first.
pub async fn list_executions<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
    Path(job_id): Path<String>,
    Query(query): Query<ListExecutionsQuery>,
) -> Result<Json<ExecutionListResponse>, ApiError> {
    let job_id = JobId::new(job_id);

    // Verify job exists
    state.storage.get_job(&job_id).await?;

    let executions: Vec<ExecutionResponse> = state
        .storage
        .list_executions(&job_id, query.limit)
        .await?
        .into_iter()
        .map(ExecutionResponse::from)
        .collect();
    let count = executions.len();
    Ok(Json(ExecutionListResponse { executions, count }))
}
