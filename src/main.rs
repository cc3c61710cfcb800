use anyhow::{Context, Result};
use std::env;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use sweeparr::core::config::Config;
use sweeparr::core::startup::log_job_summary;
use sweeparr::core::state::AppState;
use sweeparr::core::tracing_init::init_tracing;
use sweeparr::jobs::{download_cleaner, malware_blocker, queue_cleaner};
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let config_path = if args.len() > 1 {
        PathBuf::from(&args[1])
    } else {
        PathBuf::from("config.toml")
    };

    let config = Config::from_file(&config_path).context(format!(
        "Failed to load configuration from '{}'. \
        Copy config.example.toml to config.toml and adjust the values.",
        config_path.display()
    ))?;

    init_tracing(&config.logging);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.general.worker_threads)
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    runtime.block_on(async_main(config, config_path))
}

async fn async_main(config: Config, config_path: PathBuf) -> Result<()> {
    info!(
        config_path = %config_path.display(),
        worker_threads = config.general.worker_threads,
        dry_run = config.general.dry_run,
        log_level = %config.logging.level,
        log_format = %config.logging.format,
        "sweeparr starting"
    );

    log_job_summary(&config);

    let state = AppState::new(config).context("Failed to build application state")?;

    info!(
        download_clients = state.clients.len(),
        arr_instances = state.arrs.len(),
        "Startup complete"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::new();

    let jobs = &state.config;
    if jobs.queue_cleaner.enabled {
        handles.push(spawn_job(
            "queue_cleaner",
            Duration::from_secs(jobs.queue_cleaner.interval_seconds),
            shutdown_rx.clone(),
            state.clone(),
            |state| async move {
                queue_cleaner::execute(&state).await;
            },
        ));
    }

    if jobs.malware_blocker.enabled {
        handles.push(spawn_job(
            "malware_blocker",
            Duration::from_secs(jobs.malware_blocker.interval_seconds),
            shutdown_rx.clone(),
            state.clone(),
            |state| async move {
                malware_blocker::execute(&state).await;
            },
        ));
    }

    if jobs.download_cleaner.enabled {
        handles.push(spawn_job(
            "download_cleaner",
            Duration::from_secs(jobs.download_cleaner.interval_seconds),
            shutdown_rx.clone(),
            state.clone(),
            |state| async move {
                download_cleaner::execute(&state).await;
            },
        ));
    }

    handles.push(spawn_purge_task(state.clone(), shutdown_rx));

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Job task failed");
        }
    }

    info!("Shutting down gracefully");

    Ok(())
}

/// Run `job` on a fixed interval until shutdown. A run in progress is
/// allowed to finish; ticks missed while it runs are skipped.
fn spawn_job<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    state: AppState,
    job: F,
) -> JoinHandle<()>
where
    F: Fn(AppState) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(job = name, interval_seconds = period.as_secs(), "Job scheduled");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!(job = name, "Job run starting");
                    job(state.clone()).await;
                }
                _ = shutdown.changed() => break,
            }
        }

        info!(job = name, "Job stopped");
    })
}

/// Periodically drop expired strikes and removal marks
fn spawn_purge_task(state: AppState, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = state.purge_expired();
                    if removed > 0 {
                        debug!(removed, "Purged expired entries");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Shutdown signal received, waiting for running jobs");
}
