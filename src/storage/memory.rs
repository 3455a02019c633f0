//! In-memory storage implementation.
//!
//! Provides a thread-safe in-memory backend for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{Storage, StorageError};
use crate::core::job::{JobRecord, JobStatus, JobUpdate};
use crate::core::outcome::ExecutionOutcome;
use crate::core::types::JobId;

/// In-memory storage backend.
///
/// Thread-safe storage using RwLock for concurrent access.
/// Data is not persisted across restarts.
pub struct InMemoryStorage {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
    executions: RwLock<Vec<ExecutionOutcome>>,
}

impl InMemoryStorage {
    /// Create a new empty in-memory storage.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            executions: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn save_job(&self, job: JobRecord) -> Result<(), StorageError> {
        let mut jobs = self.jobs.write().map_err(|_| StorageError::LockPoisoned)?;
        if jobs.contains_key(&job.id) {
            return Err(StorageError::DuplicateKey(format!("job: {}", job.id)));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn get_job(&self, id: &JobId) -> Result<JobRecord, StorageError> {
        let jobs = self.jobs.read().map_err(|_| StorageError::LockPoisoned)?;
        jobs.get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("job: {}", id)))
    }

    async fn list_jobs(&self) -> Result<Vec<JobRecord>, StorageError> {
        let jobs = self.jobs.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut result: Vec<_> = jobs.values().cloned().collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(result)
    }

    async fn list_active_jobs(&self) -> Result<Vec<JobRecord>, StorageError> {
        let mut jobs = self.list_jobs().await?;
        jobs.retain(JobRecord::is_active);
        Ok(jobs)
    }

    async fn update_job(&self, id: &JobId, update: JobUpdate) -> Result<JobRecord, StorageError> {
        let mut jobs = self.jobs.write().map_err(|_| StorageError::LockPoisoned)?;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("job: {}", id)))?;
        update.apply_to(job);
        Ok(job.clone())
    }

    async fn delete_job(&self, id: &JobId) -> Result<JobRecord, StorageError> {
        let update = JobUpdate {
            status: Some(JobStatus::Deleted),
            ..JobUpdate::default()
        };
        self.update_job(id, update).await
    }

    async fn save_execution(&self, outcome: ExecutionOutcome) -> Result<(), StorageError> {
        let mut executions = self
            .executions
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        if executions.iter().any(|e| e.id == outcome.id) {
            return Err(StorageError::DuplicateKey(format!(
                "execution: {}",
                outcome.id
            )));
        }
        executions.push(outcome);
        Ok(())
    }

    async fn list_executions(
        &self,
        job_id: &JobId,
        limit: usize,
    ) -> Result<Vec<ExecutionOutcome>, StorageError> {
        let executions = self
            .executions
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        let mut result: Vec<_> = executions
            .iter()
            .filter(|e| &e.job_id == job_id)
            .cloned()
            .collect();
        // Most recent occurrence first
        result.sort_by(|a, b| b.occurrence.cmp(&a.occurrence));
        result.truncate(limit);
        Ok(result)
    }
}
