//! Scheduler engine implementation.
//!
//! The scheduler is responsible for:
//! - Arming one timer per active job for its next occurrence
//! - Handing fired occurrences to the dispatcher without waiting for them
//! - Rescheduling jobs when they are added, updated or removed
//! - Measuring fire drift and counting outcomes
//! - Event emission
//!
//! All mutations of the job map happen on the scheduler task, which processes
//! commands and timer notifications one at a time. Each armed timer carries a
//! generation number; a notification from a timer that has since been cancelled
//! or replaced no longer matches its entry and is dropped.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::core::clock::{Clock, SystemClock};
use crate::core::job::{JobRecord, JobUpdate};
use crate::core::retry::RetryPolicy;
use crate::core::schedule::Schedule;
use crate::core::types::JobId;
use crate::events::{Event, EventBus};
use crate::execution::{Dispatcher, Transport};
use crate::storage::Storage;

use super::handle::{COMMAND_CHANNEL_BUFFER, SchedulerHandle};
use super::metrics::MetricsRecorder;
use super::timer::{self, DEFAULT_MAX_TIMER_DELAY, TimerContext, TimerFired};
use super::types::{ScheduledJob, SchedulerCommand, SchedulerError, SchedulerState};

/// The scheduler: configured here, then run as a task by [`Scheduler::start`].
pub struct Scheduler<S: Storage> {
    storage: Arc<S>,
    transport: Arc<dyn Transport>,
    event_bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    /// Retry policy for at-least-once jobs.
    retry_policy: RetryPolicy,
    /// Longest single timer sleep; longer delays are chained.
    max_timer_delay: Duration,
}

impl<S: Storage + 'static> Scheduler<S> {
    /// Create a new scheduler with the given storage and transport.
    pub fn new(storage: S, transport: Arc<dyn Transport>) -> Self {
        Self::with_storage(Arc::new(storage), transport)
    }

    /// Create a new scheduler with shared storage.
    pub fn with_storage(storage: Arc<S>, transport: Arc<dyn Transport>) -> Self {
        Self {
            storage,
            transport,
            event_bus: Arc::new(EventBus::new()),
            clock: Arc::new(SystemClock),
            retry_policy: RetryPolicy::default(),
            max_timer_delay: DEFAULT_MAX_TIMER_DELAY,
        }
    }

    /// Set the event bus.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Arc::new(event_bus);
        self
    }

    /// Set the clock used for fire instants and drift.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the retry policy for at-least-once jobs.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the longest single timer sleep.
    pub fn with_max_timer_delay(mut self, delay: Duration) -> Self {
        self.max_timer_delay = delay;
        self
    }

    /// Get the event bus.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Load active jobs, start the scheduler task and return a handle for controlling it.
    ///
    /// Jobs are armed before this returns. Jobs that cannot be scheduled are logged
    /// and skipped.
    pub async fn start(self) -> (SchedulerHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_BUFFER);
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let state = Arc::new(RwLock::new(SchedulerState::Stopped));
        let metrics = Arc::new(MetricsRecorder::new());
        let live_timers = Arc::new(AtomicUsize::new(0));

        let dispatcher = Dispatcher::new(Arc::clone(&self.storage), self.transport)
            .with_retry_policy(self.retry_policy)
            .with_event_bus(Arc::clone(&self.event_bus));

        let mut core = SchedulerCore {
            storage: self.storage,
            dispatcher,
            event_bus: self.event_bus,
            clock: Arc::clone(&self.clock),
            timers: TimerContext {
                clock: self.clock,
                max_delay: self.max_timer_delay,
                fired_tx,
                live_timers: Arc::clone(&live_timers),
            },
            entries: HashMap::new(),
            generation: 0,
            metrics: Arc::clone(&metrics),
            state: Arc::clone(&state),
        };

        if let Err(e) = core.start().await {
            error!(error = %e, "Failed to load jobs on startup");
        }

        let handle = SchedulerHandle {
            command_tx,
            state,
            metrics,
            live_timers,
        };

        let scheduler_task = tokio::spawn(async move {
            core.run(command_rx, fired_rx).await;
        });

        (handle, scheduler_task)
    }
}

/// In-memory state of one scheduled job.
struct ScheduledEntry {
    job: JobRecord,
    schedule: Schedule,
    next_fire: DateTime<Utc>,
    generation: u64,
    timer: JoinHandle<()>,
}

/// State owned by the scheduler task.
struct SchedulerCore<S: Storage> {
    storage: Arc<S>,
    dispatcher: Dispatcher<S>,
    event_bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    timers: TimerContext,
    entries: HashMap<JobId, ScheduledEntry>,
    /// Last timer generation handed out.
    generation: u64,
    metrics: Arc<MetricsRecorder>,
    state: Arc<RwLock<SchedulerState>>,
}

impl<S: Storage + 'static> SchedulerCore<S> {
    /// Main scheduler loop.
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<SchedulerCommand>,
        mut fired_rx: mpsc::UnboundedReceiver<TimerFired>,
    ) {
        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    let Some(command) = command else {
                        // Every handle is gone
                        self.stop().await;
                        break;
                    };
                    if !self.handle_command(command).await {
                        break;
                    }
                }

                Some(fired) = fired_rx.recv() => {
                    self.on_timer_fired(fired).await;
                }
            }
        }
    }

    /// Process one command. Returns false when the scheduler should exit.
    async fn handle_command(&mut self, command: SchedulerCommand) -> bool {
        match command {
            SchedulerCommand::Start { response } => {
                let result = self.start().await;
                let _ = response.send(result);
            }
            SchedulerCommand::Stop { response } => {
                self.stop().await;
                let _ = response.send(());
            }
            SchedulerCommand::AddJob { job, response } => {
                let result = self.add_job(job).await;
                let _ = response.send(result);
            }
            SchedulerCommand::UpdateJob {
                job_id,
                update,
                response,
            } => {
                let result = self.update_job(job_id, update).await;
                let _ = response.send(result);
            }
            SchedulerCommand::RemoveJob { job_id, response } => {
                let removed = self.cancel(&job_id).await;
                if removed {
                    info!(job_id = %job_id, "Job unscheduled");
                }
                let _ = response.send(removed);
            }
            SchedulerCommand::ScheduledJobs { response } => {
                let _ = response.send(self.scheduled_jobs());
            }
            SchedulerCommand::Shutdown { response } => {
                self.stop().await;
                info!("Scheduler shut down");
                let _ = response.send(());
                return false;
            }
        }
        true
    }

    async fn start(&mut self) -> Result<usize, SchedulerError> {
        if *self.state.read().await == SchedulerState::Running {
            return Ok(self.entries.len());
        }

        let jobs = self.storage.list_active_jobs().await?;
        for job in jobs {
            let job_id = job.id.clone();
            if let Err(e) = self.schedule(job).await {
                warn!(job_id = %job_id, error = %e, "Skipping job that cannot be scheduled");
            }
        }

        *self.state.write().await = SchedulerState::Running;
        info!(jobs = self.entries.len(), "Scheduler started");
        Ok(self.entries.len())
    }

    async fn stop(&mut self) {
        let job_ids: Vec<JobId> = self.entries.keys().cloned().collect();
        for job_id in &job_ids {
            self.cancel(job_id).await;
        }
        *self.state.write().await = SchedulerState::Stopped;
        info!(cancelled = job_ids.len(), "Scheduler stopped");
    }

    async fn add_job(&mut self, job: JobRecord) -> Result<DateTime<Utc>, SchedulerError> {
        if *self.state.read().await != SchedulerState::Running {
            return Err(SchedulerError::NotRunning);
        }
        if !job.is_active() {
            return Err(SchedulerError::JobNotActive(job.id.to_string()));
        }
        self.schedule(job).await
    }

    async fn update_job(
        &mut self,
        job_id: JobId,
        update: JobUpdate,
    ) -> Result<JobRecord, SchedulerError> {
        if !self.entries.contains_key(&job_id) {
            return Err(SchedulerError::JobNotActive(job_id.to_string()));
        }

        // A malformed replacement leaves both the record and the armed timer untouched.
        if let Some(expression) = &update.schedule {
            Schedule::new(expression.as_str())?;
        }

        let record = self.storage.update_job(&job_id, update).await?;
        if !record.is_active() {
            self.cancel(&job_id).await;
            info!(job_id = %job_id, "Job deactivated by update, unscheduled");
            return Ok(record);
        }

        match self.schedule(record.clone()).await {
            Ok(next_fire) => {
                info!(job_id = %job_id, next_fire = %next_fire, "Job rescheduled");
                Ok(record)
            }
            Err(e) => {
                warn!(
                    job_id = %job_id,
                    error = %e,
                    "Updated job has no upcoming occurrence, left unscheduled"
                );
                Err(e)
            }
        }
    }

    /// Parse, cancel any existing timer, compute the next fire instant and arm.
    ///
    /// When no occurrence exists the job ends up unscheduled.
    async fn schedule(&mut self, job: JobRecord) -> Result<DateTime<Utc>, SchedulerError> {
        let schedule = Schedule::new(job.schedule.as_str())?;
        self.cancel(&job.id).await;

        let next_fire = schedule.next_after(self.clock.now())?;
        self.arm(job, schedule, next_fire);
        Ok(next_fire)
    }

    fn arm(&mut self, job: JobRecord, schedule: Schedule, next_fire: DateTime<Utc>) {
        self.generation += 1;
        let generation = self.generation;
        let timer = self.timers.arm(job.id.clone(), generation, next_fire);

        debug!(job_id = %job.id, next_fire = %next_fire, generation, "Timer armed");
        self.event_bus
            .emit_detached(Event::job_scheduled(job.id.clone(), next_fire));

        self.entries.insert(
            job.id.clone(),
            ScheduledEntry {
                job,
                schedule,
                next_fire,
                generation,
                timer,
            },
        );
    }

    /// Cancel the job's timer and drop its entry. Returns whether an entry existed.
    async fn cancel(&mut self, job_id: &JobId) -> bool {
        match self.entries.remove(job_id) {
            Some(entry) => {
                timer::cancel(entry.timer).await;
                true
            }
            None => false,
        }
    }

    async fn on_timer_fired(&mut self, fired: TimerFired) {
        let current = self.entries.get(&fired.job_id).map(|e| e.generation);
        if current != Some(fired.generation) {
            debug!(
                job_id = %fired.job_id,
                generation = fired.generation,
                "Dropping notification from a replaced timer"
            );
            return;
        }
        let Some(entry) = self.entries.remove(&fired.job_id) else {
            return;
        };

        let occurrence = entry.next_fire;
        let drift = (fired.fired_at - occurrence)
            .to_std()
            .unwrap_or(Duration::ZERO);
        self.metrics.record_fire(drift);
        info!(
            job_id = %entry.job.id,
            occurrence = %occurrence,
            drift_ms = drift.as_millis() as u64,
            "Job fired"
        );
        self.event_bus.emit_detached(Event::job_fired(
            entry.job.id.clone(),
            occurrence,
            drift,
        ));

        let dispatcher = self.dispatcher.clone();
        let metrics = Arc::clone(&self.metrics);
        let job = entry.job.clone();
        tokio::spawn(async move {
            let outcome = dispatcher.dispatch(&job, occurrence).await;
            metrics.record_outcome(outcome.is_success());
        });

        // Never schedule the same occurrence twice, even if the clock reads early.
        let from = std::cmp::max(self.clock.now(), occurrence);
        match entry.schedule.next_after(from) {
            Ok(next_fire) => self.arm(entry.job, entry.schedule, next_fire),
            Err(e) => {
                warn!(job_id = %entry.job.id, error = %e, "No further occurrence, job unscheduled");
            }
        }
    }

    fn scheduled_jobs(&self) -> Vec<ScheduledJob> {
        let mut jobs: Vec<ScheduledJob> = self
            .entries
            .values()
            .map(|entry| ScheduledJob {
                job_id: entry.job.id.clone(),
                next_fire: entry.next_fire,
                generation: entry.generation,
            })
            .collect();
        jobs.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        jobs
    }
}
