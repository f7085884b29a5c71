#![doc = include_str!("../README.md")]

mod config;
mod telemetry;

use anyhow::{Context, bail};
use clap::Parser;
use config::{CliArgs, RunConfig};
use core::time::Duration;
use lookout::{
    NoopObserver, Observer, OsRandom, PoolReport, SharedTable, TraceObserver, WorkerPool,
};
use std::sync::Arc;
use telemetry::init_telemetry;
use tokio::{signal, task, time};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    CtrlC,
    Terminate,
    DurationElapsed,
    WorkersFinished,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = RunConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    // Construction finishes on this blocking task before any worker exists;
    // workers only ever see the published `Arc`.
    let pairs = config.pairs;
    let table = task::spawn_blocking(move || SharedTable::build(pairs))
        .await
        .context("table construction task failed")?
        .context("failed to build lookup table")?
        .publish();

    let pool = Arc::new(if config.log_lookups {
        start_pool(&config, table, Arc::new(TraceObserver))?
    } else {
        start_pool(&config, table, Arc::new(NoopObserver))?
    });

    let reason = wait_for_stop(&config, &pool).await;
    tracing::info!("Stopping workers ({reason:?})");
    pool.cancel();

    let idle = {
        let pool = Arc::clone(&pool);
        let timeout = config.shutdown_timeout;
        task::spawn_blocking(move || pool.wait_idle(timeout)).await?
    };
    if !idle {
        bail!(
            "{} workers still running after {:?}",
            pool.live_workers(),
            config.shutdown_timeout
        );
    }

    let report = {
        let pool = Arc::clone(&pool);
        task::spawn_blocking(move || pool.join()).await?
    }
    .context("worker pool did not shut down cleanly")?;

    log_report(&report);
    if config.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    tracing::info!("Shut down successfully");
    Ok(())
}

fn start_pool<O>(
    config: &RunConfig,
    table: Arc<SharedTable>,
    observer: Arc<O>,
) -> anyhow::Result<WorkerPool>
where
    O: Observer + 'static,
{
    WorkerPool::start_with(config.pool.clone(), table, |_| OsRandom::new(), observer)
        .context("failed to start worker pool")
}

fn log_startup_info(config: &RunConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting lookout with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting lookout with {} pairs and {} workers",
            config.pairs,
            config.pool.num_workers
        );
    }
}

fn log_report(report: &PoolReport) {
    for worker in &report.workers {
        tracing::debug!(
            worker = worker.worker,
            iterations = worker.iterations,
            hits = worker.hits,
            state = ?worker.state,
            "Worker summary"
        );
    }
    tracing::info!(
        lookups = report.total_iterations,
        hits = report.total_hits,
        elapsed = ?report.elapsed,
        lookups_per_sec = report.lookups_per_sec() as u64,
        "Run complete"
    );
}

/// Resolves on Ctrl+C, SIGTERM, the configured run duration, or once every
/// worker has exhausted its iteration bound.
async fn wait_for_stop(config: &RunConfig, pool: &WorkerPool) -> StopReason {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    let elapsed = async {
        match config.duration {
            Some(duration) => time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };

    let finished = async {
        let mut ticker = time::interval(Duration::from_millis(50));
        while pool.live_workers() > 0 {
            ticker.tick().await;
        }
    };

    tokio::select! {
        () = ctrl_c => StopReason::CtrlC,
        () = terminate => StopReason::Terminate,
        () = elapsed => StopReason::DurationElapsed,
        () = finished => StopReason::WorkersFinished,
    }
}
