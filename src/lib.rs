//! cronhook - a second-granularity cron scheduler that fires HTTP webhooks.
//!
//! Jobs pair a six-field schedule expression with a target URL. The scheduler
//! arms one timer per active job, calls the URL when it fires and records one
//! outcome per occurrence, retrying failed calls for at-least-once jobs.

pub mod api;
pub mod config;
pub mod core;
pub mod events;
pub mod execution;
pub mod scheduler;
pub mod storage;
pub mod testing;

pub use config::{ConfigError, GlobalConfig, JobConfigBuilder, YamlLoader};
pub use core::clock::{Clock, SystemClock};
pub use core::expression::{Field, FieldMatcher, ScheduleError, ScheduleSpec};
pub use core::job::{DeliveryMode, JobRecord, JobStatus, JobUpdate};
pub use core::outcome::{ExecutionOutcome, OutcomeStatus};
pub use core::retry::{Backoff, RetryPolicy};
pub use core::schedule::{Schedule, next_execution};
pub use core::types::{ExecutionId, JobId};
pub use events::{AlertLogger, Event, EventBus, EventHandler, FailureAlert, WebhookAlerter};
pub use execution::{DeliveryRequest, Dispatcher, HttpTransport, Transport, TransportError};
pub use scheduler::{
    ScheduledJob, Scheduler, SchedulerError, SchedulerHandle, SchedulerMetrics, SchedulerState,
};
#[cfg(feature = "sqlite")]
pub use storage::SqliteStorage;
pub use storage::{InMemoryStorage, Storage, StorageError};
