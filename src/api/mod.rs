//! HTTP API module for the cronhook scheduler.
//!
//! Provides REST endpoints for managing jobs, reading execution history and
//! controlling the scheduler.

mod errors;
mod handlers;
mod responses;

pub use errors::{ApiError, ErrorResponse};
pub use handlers::ApiState;
pub use responses::*;

use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::scheduler::SchedulerHandle;
use crate::storage::Storage;

/// Configuration for the API server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8565,
        }
    }
}

impl ApiConfig {
    /// Create a new API config with custom host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Get the socket address.
    pub fn socket_addr(&self) -> std::io::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid socket address {}:{}: {}", self.host, self.port, e),
            )
        })
    }
}

/// Build the API router with all endpoints.
pub fn build_router<S: Storage + 'static>(state: ApiState<S>) -> Router {
    Router::new()
        // Health check
        .route("/api/health", get(handlers::health))
        // Scheduler control
        .route(
            "/api/scheduler/state",
            get(handlers::get_scheduler_state::<S>),
        )
        .route("/api/scheduler/start", post(handlers::start_scheduler::<S>))
        .route("/api/scheduler/stop", post(handlers::stop_scheduler::<S>))
        .route("/api/metrics", get(handlers::get_metrics::<S>))
        // Jobs
        .route(
            "/api/jobs",
            get(handlers::list_jobs::<S>).post(handlers::create_job::<S>),
        )
        .route(
            "/api/jobs/{job_id}",
            get(handlers::get_job::<S>)
                .patch(handlers::update_job::<S>)
                .delete(handlers::delete_job::<S>),
        )
        .route(
            "/api/jobs/{job_id}/executions",
            get(handlers::list_executions::<S>),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Create the API state from scheduler components.
pub fn create_api_state<S: Storage>(handle: SchedulerHandle, storage: Arc<S>) -> ApiState<S> {
    ApiState { handle, storage }
}

/// Start the API server.
///
/// This function spawns the server and returns a handle to the task.
/// The server runs until the task is aborted or the process exits.
pub async fn start_server<S: Storage + 'static>(
    config: ApiConfig,
    state: ApiState<S>,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let router = build_router(state);
    let addr = config.socket_addr()?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("API server listening on http://{}", addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(handle)
}
