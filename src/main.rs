//! cronhook - a second-granularity cron scheduler for HTTP webhooks.
//!
//! Usage:
//!   cronhook run [--config FILE]   Run the scheduler and its HTTP API
//!   cronhook validate <EXPRESSION> Parse an expression and show its field sets
//!   cronhook next <EXPRESSION>     Print upcoming fire instants

use chrono::Utc;
use clap::{Parser, Subcommand};
use cronhook::api::{self, ApiConfig};
use cronhook::config::{GlobalConfig, JobConfigBuilder, StorageConfig, load_jobs_from_directory};
use cronhook::{
    AlertLogger, Event, EventBus, EventHandler, Field, HttpTransport, InMemoryStorage, JobRecord,
    Schedule, Scheduler, Storage, StorageError, WebhookAlerter, YamlLoader,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// cronhook - a second-granularity cron scheduler for HTTP webhooks
#[derive(Parser)]
#[command(name = "cronhook")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and the HTTP API
    Run {
        /// Path to the global YAML configuration file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Directory of job YAML files to seed, one job per file
        #[arg(long, value_name = "JOBS_DIR")]
        jobs_dir: Option<PathBuf>,

        /// Host to bind the API to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind the API to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Parse a schedule expression and print the values each field accepts
    Validate {
        /// Six-field expression: second minute hour day-of-month month day-of-week
        #[arg(value_name = "EXPRESSION")]
        expression: String,
    },

    /// Print the next fire instants of a schedule expression
    Next {
        /// Six-field expression: second minute hour day-of-month month day-of-week
        #[arg(value_name = "EXPRESSION")]
        expression: String,

        /// Number of instants to print
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,
    },
}

/// Logs fires and delivery results.
struct LoggingHandler;

#[async_trait::async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &Event) {
        match event {
            Event::JobScheduled {
                job_id, next_fire, ..
            } => {
                debug!(job_id = %job_id, next_fire = %next_fire, "Job armed");
            }
            Event::JobFired {
                job_id,
                occurrence,
                drift,
                ..
            } => {
                info!(
                    job_id = %job_id,
                    occurrence = %occurrence,
                    drift_ms = drift.as_millis() as u64,
                    "Job fired"
                );
            }
            Event::ExecutionCompleted {
                job_id,
                execution_id,
                success,
                attempts,
                duration,
                ..
            } => {
                info!(
                    job_id = %job_id,
                    execution_id = %execution_id,
                    success,
                    attempts,
                    duration_ms = duration.as_millis() as u64,
                    "Execution completed"
                );
            }
            // Reported by AlertLogger.
            Event::ExecutionFailed { .. } => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            jobs_dir,
            host,
            port,
        } => {
            let mut config = match config {
                Some(path) => {
                    info!("Loading configuration from: {}", path.display());
                    YamlLoader::load_global_config(&path)?
                }
                None => GlobalConfig::default(),
            };
            if let Some(host) = host {
                config.api.host = host;
            }
            if let Some(port) = port {
                config.api.port = port;
            }

            let mut seeds: Vec<JobRecord> = config
                .jobs
                .iter()
                .cloned()
                .map(JobConfigBuilder::build)
                .collect();
            if let Some(dir) = jobs_dir {
                info!("Loading jobs from: {}", dir.display());
                seeds.extend(load_jobs_from_directory(&dir)?);
            }

            match config.storage.clone() {
                StorageConfig::Memory => {
                    run(config, seeds, Arc::new(InMemoryStorage::new())).await?;
                }
                #[cfg(feature = "sqlite")]
                StorageConfig::Sqlite { path } => {
                    info!("Using SQLite storage at: {}", path);
                    let storage = Arc::new(cronhook::SqliteStorage::new(&path).await?);
                    run(config, seeds, Arc::clone(&storage)).await?;
                    storage.close().await;
                }
                #[cfg(not(feature = "sqlite"))]
                StorageConfig::Sqlite { .. } => {
                    return Err("SQLite storage requires the 'sqlite' feature".into());
                }
            }
        }
        Commands::Validate { expression } => {
            validate_expression(&expression)?;
        }
        Commands::Next { expression, count } => {
            print_next(&expression, count)?;
        }
    }

    Ok(())
}

/// Save seed jobs that do not exist yet. Existing records, deleted ones included, win.
async fn seed_jobs<S: Storage>(storage: &S, seeds: Vec<JobRecord>) -> Result<(), StorageError> {
    for job in seeds {
        match storage.get_job(&job.id).await {
            Ok(_) => debug!(job_id = %job.id, "Seed job already stored, skipping"),
            Err(StorageError::NotFound(_)) => {
                info!(job_id = %job.id, schedule = %job.schedule, "Seeding job");
                storage.save_job(job).await?;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Run the scheduler and the API until Ctrl+C.
async fn run<S: Storage + 'static>(
    config: GlobalConfig,
    seeds: Vec<JobRecord>,
    storage: Arc<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    seed_jobs(storage.as_ref(), seeds).await?;

    // Create event bus with logging and alert handlers
    let event_bus = EventBus::new();
    event_bus.register(Arc::new(LoggingHandler)).await;
    event_bus.register(Arc::new(AlertLogger)).await;
    if let Some(url) = &config.alerts.webhook_url {
        info!("Posting failure alerts to: {}", url);
        event_bus
            .register(Arc::new(WebhookAlerter::new(url.as_str())?))
            .await;
    }

    let transport = Arc::new(HttpTransport::with_timeout(config.delivery.timeout())?);

    let scheduler = Scheduler::with_storage(Arc::clone(&storage), transport)
        .with_event_bus(event_bus)
        .with_retry_policy(JobConfigBuilder::build_retry_policy(&config.delivery))
        .with_max_timer_delay(config.scheduler.max_timer_delay());

    let (handle, scheduler_task) = scheduler.start().await;
    let scheduled = handle.scheduled_jobs().await?;
    info!("Scheduler running with {} job(s)", scheduled.len());
    for job in &scheduled {
        info!("  - {} next fires at {}", job.job_id, job.next_fire);
    }

    let api_config = ApiConfig::new(config.api.host.clone(), config.api.port);
    let api_state = api::create_api_state(handle.clone(), Arc::clone(&storage));
    let server = api::start_server(api_config, api_state).await?;

    info!("Press Ctrl+C to stop");

    // Wait for Ctrl+C
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
            handle.shutdown().await?;
        }
        _ = scheduler_task => {
            warn!("Scheduler stopped unexpectedly");
        }
    }

    server.abort();
    info!("Goodbye!");
    Ok(())
}

/// Parse an expression and print the values each field accepts.
fn validate_expression(expression: &str) -> Result<(), Box<dyn std::error::Error>> {
    let schedule = Schedule::new(expression)?;

    println!("Expression: {}", schedule.expression());
    for field in Field::ALL {
        println!("  {:<13} {}", field.name(), schedule.spec().field(field));
    }

    match schedule.next_after(Utc::now()) {
        Ok(next) => println!("Next fire: {}", next.to_rfc3339()),
        Err(e) => println!("Warning: {}", e),
    }

    Ok(())
}

/// Print the next `count` fire instants from now.
fn print_next(expression: &str, count: usize) -> Result<(), Box<dyn std::error::Error>> {
    let schedule = Schedule::new(expression)?;
    for instant in schedule.next_n_after(Utc::now(), count)? {
        println!("{}", instant.to_rfc3339());
    }
    Ok(())
}
