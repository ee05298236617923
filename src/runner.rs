//! Run modes
//!
//! Every mode goes through the TCP protocol, including standalone, which
//! binds an ephemeral localhost port and points its own worker loops at it.

use crate::config::cli::ExecutionMode;
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::distributed::{run_remote_workers, CoordinatorServer, WorkerOptions, WorkerSummary};
use crate::job::Job;
use crate::output::RunReport;
use crate::provider::CollectingProvider;
use crate::Result;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::oneshot;

fn worker_options(config: &Config) -> WorkerOptions {
    WorkerOptions {
        poll_interval: config.worker.poll_interval(),
    }
}

/// Coordinator plus local worker loops in one process
pub async fn run_standalone(config: &Config) -> Result<RunReport<Value>> {
    let started_at = Utc::now();
    let provider = Arc::new(CollectingProvider::new(config.jobs.clone()));
    let coordinator: Arc<Coordinator<Job>> = Arc::new(Coordinator::create(provider.clone()));

    let server = CoordinatorServer::bind(coordinator.clone(), "127.0.0.1:0").await?;
    let addr = server.local_addr()?.to_string();

    // Keep accepting until every local loop has connected and exited
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serve = server.serve_until(async {
        let _ = stop_rx.await;
    });
    let workers = async {
        let summaries =
            run_remote_workers::<Job>(&addr, config.worker.workers, worker_options(config)).await;
        let _ = stop_tx.send(());
        summaries
    };

    let (served, summaries) = tokio::join!(serve, workers);
    served?;
    let summaries = summaries?;

    Ok(RunReport::new(
        ExecutionMode::Standalone,
        started_at,
        coordinator.stats(),
        provider.events(),
    )
    .with_workers(summaries))
}

/// Serve jobs to remote workers until all of them are finished
///
/// After completion the server keeps answering for the configured linger
/// period so idle workers learn that they can exit.
pub async fn run_coordinator(config: &Config) -> Result<RunReport<Value>> {
    let started_at = Utc::now();
    let provider = Arc::new(CollectingProvider::new(config.jobs.clone()));
    let coordinator: Arc<Coordinator<Job>> = Arc::new(Coordinator::create(provider.clone()));

    let server = CoordinatorServer::bind(coordinator.clone(), &config.coordinator.listen).await?;

    let linger = config.coordinator.linger();
    let waiter = provider.clone();
    server
        .serve_until(async move {
            waiter.wait_done().await;
            tracing::info!(linger_ms = linger.as_millis() as u64, "all tasks finished");
            tokio::time::sleep(linger).await;
        })
        .await?;

    Ok(RunReport::new(
        ExecutionMode::Coordinator,
        started_at,
        coordinator.stats(),
        provider.events(),
    ))
}

/// Pull from a remote coordinator until it reports completion
pub async fn run_worker(config: &Config) -> Result<Vec<WorkerSummary>> {
    run_remote_workers::<Job>(
        &config.worker.connect,
        config.worker.workers,
        worker_options(config),
    )
    .await
}
