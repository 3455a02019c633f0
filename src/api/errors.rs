//! API error types and HTTP status mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::core::expression::ScheduleError;
use crate::scheduler::SchedulerError;
use crate::storage::StorageError;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// The request body or parameters are invalid.
    BadRequest(String),
    /// The schedule expression does not parse.
    MalformedExpression(String),
    /// The schedule expression never fires within the search horizon.
    NoExecutionFound(String),
    /// The job is not scheduled, so it cannot be updated.
    JobNotActive(String),
    /// Resource not found.
    NotFound(String),
    /// Request conflict (e.g., duplicate job id).
    Conflict(String),
    /// Service unavailable (e.g., scheduler task gone).
    ServiceUnavailable(String),
    /// Internal server error.
    Internal(String),
}

impl ApiError {
    fn parts(self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::MalformedExpression(msg) => {
                (StatusCode::BAD_REQUEST, "MALFORMED_EXPRESSION", msg)
            }
            ApiError::NoExecutionFound(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "NO_EXECUTION_FOUND", msg)
            }
            ApiError::JobNotActive(msg) => (StatusCode::CONFLICT, "JOB_NOT_ACTIVE", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ScheduleError> for ApiError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::MalformedExpression { .. } => {
                ApiError::MalformedExpression(err.to_string())
            }
            ScheduleError::NoExecutionFound { .. } => ApiError::NoExecutionFound(err.to_string()),
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::JobNotActive(id) => {
                ApiError::JobNotActive(format!("job not active: {}", id))
            }
            SchedulerError::Schedule(e) => e.into(),
            SchedulerError::Storage(e) => e.into(),
            SchedulerError::NotRunning => {
                ApiError::ServiceUnavailable("scheduler is not running".to_string())
            }
            SchedulerError::ChannelError(msg) => ApiError::ServiceUnavailable(msg),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => ApiError::NotFound(msg),
            StorageError::DuplicateKey(msg) => ApiError::Conflict(msg),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
