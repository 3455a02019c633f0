//! Storage abstraction for persisting jobs and execution outcomes.
//!
//! This module provides a trait-based storage abstraction with
//! pluggable backends (in-memory, SQLite).

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::InMemoryStorage;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::job::{JobRecord, JobUpdate};
use crate::core::outcome::ExecutionOutcome;
use crate::core::types::JobId;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested item was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A duplicate key was detected.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// Storage lock was poisoned.
    #[error("storage lock poisoned")]
    LockPoisoned,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Generic storage error.
    #[error("storage error: {0}")]
    Other(String),
}

/// Storage trait for persisting jobs and their execution history.
#[async_trait]
pub trait Storage: Send + Sync {
    // Job operations

    /// Save a new job record.
    async fn save_job(&self, job: JobRecord) -> Result<(), StorageError>;

    /// Get a job by ID, whatever its status.
    async fn get_job(&self, id: &JobId) -> Result<JobRecord, StorageError>;

    /// List all jobs, including deleted ones, ordered by creation time.
    async fn list_jobs(&self) -> Result<Vec<JobRecord>, StorageError>;

    /// List active jobs, ordered by creation time.
    async fn list_active_jobs(&self) -> Result<Vec<JobRecord>, StorageError>;

    /// Apply a partial update and return the updated record.
    ///
    /// Applied atomically; fields the update leaves unset keep their stored value.
    async fn update_job(&self, id: &JobId, update: JobUpdate) -> Result<JobRecord, StorageError>;

    /// Soft-delete a job: its status becomes deleted and the record is kept.
    async fn delete_job(&self, id: &JobId) -> Result<JobRecord, StorageError>;

    // Execution operations

    /// Record the outcome of one occurrence.
    async fn save_execution(&self, outcome: ExecutionOutcome) -> Result<(), StorageError>;

    /// List outcomes for a job, most recent occurrence first.
    /// Returns at most `limit` outcomes.
    async fn list_executions(
        &self,
        job_id: &JobId,
        limit: usize,
    ) -> Result<Vec<ExecutionOutcome>, StorageError>;
}
