//! SQLite storage implementation.
//!
//! Provides persistent storage using SQLite database.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use super::{Storage, StorageError};
use crate::core::job::{DeliveryMode, JobRecord, JobStatus, JobUpdate};
use crate::core::outcome::{ExecutionOutcome, OutcomeStatus};
use crate::core::types::{ExecutionId, JobId};

type JobRow = (String, String, String, String, String, String, String, String);

type ExecutionRow = (
    String,
    String,
    String,
    String,
    Option<i64>,
    i64,
    i64,
    Option<String>,
);

const JOB_COLUMNS: &str =
    "id, name, schedule, target_url, delivery_mode, status, created_at, updated_at";

const EXECUTION_COLUMNS: &str =
    "id, job_id, occurrence, status, http_status, duration_ms, attempts, error";

/// SQLite storage backend.
///
/// Provides persistent storage with automatic schema migration.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage with the given database path.
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path_str = path.as_ref().to_string_lossy();
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path_str))
            .map_err(|e| StorageError::Other(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Create an in-memory SQLite database (useful for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        let schema = include_str!("../../migrations/001_initial_schema.sql");
        sqlx::raw_sql(schema)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Other(format!("migration failed: {}", e)))?;
        Ok(())
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// Timestamps are stored as fixed-width RFC 3339 strings so they sort lexically.
fn time_to_string(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn string_to_time(s: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::SerializationError(format!("invalid timestamp {}: {}", s, e)))
}

fn row_to_job(row: JobRow) -> Result<JobRecord, StorageError> {
    Ok(JobRecord {
        id: JobId::new(row.0),
        name: row.1,
        schedule: row.2,
        target_url: row.3,
        delivery_mode: DeliveryMode::from_str(&row.4).map_err(StorageError::SerializationError)?,
        status: JobStatus::from_str(&row.5).map_err(StorageError::SerializationError)?,
        created_at: string_to_time(&row.6)?,
        updated_at: string_to_time(&row.7)?,
    })
}

fn row_to_execution(row: ExecutionRow) -> Result<ExecutionOutcome, StorageError> {
    Ok(ExecutionOutcome {
        id: ExecutionId::parse_str(&row.0)
            .map_err(|e| StorageError::SerializationError(format!("invalid uuid: {}", e)))?,
        job_id: JobId::new(row.1),
        occurrence: string_to_time(&row.2)?,
        status: OutcomeStatus::from_str(&row.3).map_err(StorageError::SerializationError)?,
        http_status: row
            .4
            .map(|s| {
                u16::try_from(s).map_err(|_| {
                    StorageError::SerializationError(format!("invalid http status: {}", s))
                })
            })
            .transpose()?,
        duration_millis: row.5.max(0) as u64,
        attempts: row.6.max(0) as u32,
        error: row.7,
    })
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn save_job(&self, job: JobRecord) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO jobs (id, name, schedule, target_url, delivery_mode, status,
                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id.as_str())
        .bind(&job.name)
        .bind(&job.schedule)
        .bind(&job.target_url)
        .bind(job.delivery_mode.as_str())
        .bind(job.status.as_str())
        .bind(time_to_string(job.created_at))
        .bind(time_to_string(job.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StorageError::DuplicateKey(format!("job: {}", job.id)))
            }
            Err(e) => Err(StorageError::Other(e.to_string())),
        }
    }

    async fn get_job(&self, id: &JobId) -> Result<JobRecord, StorageError> {
        let row: JobRow = sqlx::query_as(&format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?
            .ok_or_else(|| StorageError::NotFound(format!("job: {}", id)))?;

        row_to_job(row)
    }

    async fn list_jobs(&self) -> Result<Vec<JobRecord>, StorageError> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM jobs ORDER BY created_at, id",
            JOB_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?;

        rows.into_iter().map(row_to_job).collect()
    }

    async fn list_active_jobs(&self) -> Result<Vec<JobRecord>, StorageError> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM jobs WHERE status = ? ORDER BY created_at, id",
            JOB_COLUMNS
        ))
        .bind(JobStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?;

        rows.into_iter().map(row_to_job).collect()
    }

    async fn update_job(&self, id: &JobId, update: JobUpdate) -> Result<JobRecord, StorageError> {
        // One statement; columns the update leaves unset keep their stored value.
        let row: Option<JobRow> = sqlx::query_as(&format!(
            r#"
            UPDATE jobs SET
                name = COALESCE(?, name),
                schedule = COALESCE(?, schedule),
                target_url = COALESCE(?, target_url),
                delivery_mode = COALESCE(?, delivery_mode),
                status = COALESCE(?, status),
                updated_at = ?
            WHERE id = ?
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(update.name.as_deref())
        .bind(update.schedule.as_deref())
        .bind(update.target_url.as_deref())
        .bind(update.delivery_mode.map(|mode| mode.as_str()))
        .bind(update.status.map(|status| status.as_str()))
        .bind(time_to_string(Utc::now()))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?;

        let row = row.ok_or_else(|| StorageError::NotFound(format!("job: {}", id)))?;
        row_to_job(row)
    }

    async fn delete_job(&self, id: &JobId) -> Result<JobRecord, StorageError> {
        let update = JobUpdate {
            status: Some(JobStatus::Deleted),
            ..JobUpdate::default()
        };
        self.update_job(id, update).await
    }

    async fn save_execution(&self, outcome: ExecutionOutcome) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO executions (id, job_id, occurrence, status, http_status, duration_ms,
                attempts, error)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(outcome.id.to_string())
        .bind(outcome.job_id.as_str())
        .bind(time_to_string(outcome.occurrence))
        .bind(outcome.status.as_str())
        .bind(outcome.http_status.map(i64::from))
        .bind(outcome.duration_millis as i64)
        .bind(i64::from(outcome.attempts))
        .bind(&outcome.error)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                StorageError::DuplicateKey(format!("execution: {}", outcome.id)),
            ),
            Err(e) => Err(StorageError::Other(e.to_string())),
        }
    }

    async fn list_executions(
        &self,
        job_id: &JobId,
        limit: usize,
    ) -> Result<Vec<ExecutionOutcome>, StorageError> {
        let rows: Vec<ExecutionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM executions WHERE job_id = ? ORDER BY occurrence DESC LIMIT ?",
            EXECUTION_COLUMNS
        ))
        .bind(job_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?;

        rows.into_iter().map(row_to_execution).collect()
    }
}
