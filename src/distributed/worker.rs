//! Worker poll loop
//!
//! A worker repeatedly pulls a task, executes it on a blocking thread and
//! reports the outcome. When the coordinator has nothing to hand out the
//! worker sleeps for the poll interval (plus jitter, so idle workers do not
//! poll in lockstep) and tries again. It exits once the coordinator reports
//! that all work is finished.
//!
//! Any transport error ends the loop: the worker cannot know whether its last
//! report was recorded, and the coordinator will re-offer the task anyway.
//! Losing the connection while reporting is the one clean exit: a coordinator
//! only shuts down after every task has finished, so the report was for a
//! copy somebody else already completed. The loop stops and counts it in
//! `lost_reports`.

use crate::distributed::client::RemoteCoordinator;
use crate::distributed::service::CoordinatorService;
use crate::error::TransportError;
use crate::task::Computation;
use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Worker loop settings
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Sleep between empty polls
    pub poll_interval: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
        }
    }
}

/// What a worker loop did before exiting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub worker_id: String,
    /// Tasks executed and reported
    pub executed: u64,
    /// Executed tasks whose computation failed
    pub failed: u64,
    /// Polls answered with no task
    pub idle_polls: u64,
    /// Reports that could not be delivered because the coordinator had gone
    #[serde(default)]
    pub lost_reports: u64,
}

/// One worker loop bound to a coordinator service
pub struct Worker<S> {
    worker_id: String,
    service: S,
    options: WorkerOptions,
}

impl<S> Worker<S> {
    pub fn new(worker_id: impl Into<String>, service: S, options: WorkerOptions) -> Self {
        Self {
            worker_id: worker_id.into(),
            service,
            options,
        }
    }

    /// Pull, execute and report until the coordinator is finished
    pub async fn run<C>(self) -> Result<WorkerSummary>
    where
        C: Computation,
        S: CoordinatorService<C>,
    {
        let mut summary = WorkerSummary {
            worker_id: self.worker_id.clone(),
            ..Default::default()
        };

        loop {
            let pulled = self
                .service
                .pull()
                .await
                .with_context(|| format!("Worker {} failed to pull", self.worker_id))?;

            let Some(mut task) = pulled else {
                if self.service.coordinator_completed() {
                    break;
                }
                summary.idle_polls += 1;
                tokio::time::sleep(self.idle_delay()).await;
                continue;
            };

            let id = task.id();
            tracing::debug!(worker = %self.worker_id, task = %id, "executing {}", task.computation().label());

            let task = tokio::task::spawn_blocking(move || {
                task.execute();
                task
            })
            .await
            .with_context(|| format!("Worker {} lost task {}", self.worker_id, id))?;

            summary.executed += 1;
            if task.is_failure() {
                summary.failed += 1;
            }

            match task.report(&self.service).await {
                Ok(()) => {}
                Err(TransportError::Closed) | Err(TransportError::Io(_)) => {
                    summary.lost_reports += 1;
                    tracing::warn!(
                        worker = %self.worker_id,
                        task = %id,
                        "coordinator closed the connection before the report; stopping"
                    );
                    break;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Worker {} failed to report task {}", self.worker_id, id)
                    });
                }
            }
        }

        tracing::info!(
            worker = %summary.worker_id,
            executed = summary.executed,
            failed = summary.failed,
            "worker finished"
        );

        Ok(summary)
    }

    fn idle_delay(&self) -> Duration {
        let base = self.options.poll_interval;
        let max_jitter_ms = (base.as_millis() as u64 / 2).max(1);
        let jitter = rand::thread_rng().gen_range(0..=max_jitter_ms);
        base + Duration::from_millis(jitter)
    }
}

/// Identifier for the `index`-th worker loop on this host
pub fn worker_id(index: usize) -> String {
    format!("{}-{}", host_name(), index)
}

fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Run `count` worker loops against a remote coordinator
///
/// Each loop gets its own connection. Returns one summary per loop, or the
/// first error any loop hit.
pub async fn run_remote_workers<C: Computation>(
    addr: &str,
    count: usize,
    options: WorkerOptions,
) -> Result<Vec<WorkerSummary>> {
    let mut set = JoinSet::new();

    for index in 0..count {
        let id = worker_id(index);
        let remote = RemoteCoordinator::<C>::connect(addr, id.clone())
            .await
            .with_context(|| format!("Worker {} could not reach coordinator", id))?;
        let worker = Worker::new(id, remote, options.clone());
        set.spawn(worker.run::<C>());
    }

    collect(set).await
}

/// Run `count` worker loops against any shared service
pub async fn run_workers<C, S>(
    service: Arc<S>,
    count: usize,
    options: WorkerOptions,
) -> Result<Vec<WorkerSummary>>
where
    C: Computation,
    S: CoordinatorService<C> + 'static,
{
    let mut set = JoinSet::new();

    for index in 0..count {
        let worker = Worker::new(worker_id(index), service.clone(), options.clone());
        set.spawn(worker.run::<C>());
    }

    collect(set).await
}

/// Wait for every loop; a failed loop does not cut its siblings short
async fn collect(mut set: JoinSet<Result<WorkerSummary>>) -> Result<Vec<WorkerSummary>> {
    let mut summaries = Vec::new();
    let mut first_error = None;

    while let Some(joined) = set.join_next().await {
        match joined.context("Worker task panicked").and_then(|r| r) {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                tracing::warn!("worker loop failed: {:#}", e);
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    summaries.sort_by(|a, b| a.worker_id.cmp(&b.worker_id));
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::Coordinator;
    use crate::distributed::server::CoordinatorServer;
    use crate::distributed::service::LocalCoordinator;
    use crate::provider::CollectingProvider;
    use crate::task::testing::{value, Probe};
    use crate::task::Task;

    fn fast() -> WorkerOptions {
        WorkerOptions {
            poll_interval: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_local_workers_drain_queue() {
        let computations: Vec<Probe> = (0..50).map(|i| value(&i.to_string())).collect();
        let provider = Arc::new(CollectingProvider::new(computations));
        let coordinator = Arc::new(Coordinator::create(provider.clone()));
        let service = Arc::new(LocalCoordinator::new(coordinator.clone()));

        let summaries = run_workers::<Probe, _>(service, 4, fast()).await.unwrap();

        assert_eq!(summaries.len(), 4);
        let executed: u64 = summaries.iter().map(|s| s.executed).sum();
        assert!(executed >= 50);
        assert_eq!(provider.results().len(), 50);
        assert_eq!(provider.done_count(), 1);
        assert!(coordinator.is_completed());
    }

    #[tokio::test]
    async fn test_remote_workers_drain_queue_with_crashes() {
        let mut computations: Vec<Probe> = (0..20).map(|i| value(&i.to_string())).collect();
        computations.push(Probe::Error("boom".to_string()));
        computations.push(Probe::Panic("kaboom".to_string()));

        let provider = Arc::new(CollectingProvider::new(computations));
        let coordinator = Arc::new(Coordinator::create(provider.clone()));
        let server = CoordinatorServer::bind(coordinator.clone(), "127.0.0.1:0")
            .await
            .unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(server.serve_until(std::future::pending()));

        let summaries = run_remote_workers::<Probe>(&addr, 3, fast()).await.unwrap();

        assert_eq!(summaries.len(), 3);
        assert_eq!(provider.results().len(), 20);
        assert_eq!(provider.crashes().len(), 2);
        assert_eq!(provider.done_count(), 1);
    }

    #[tokio::test]
    async fn test_remote_workers_fail_without_coordinator() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = run_remote_workers::<Probe>(&addr, 1, fast()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_idle_delay_bounds() {
        let provider = Arc::new(CollectingProvider::new(vec![value("a")]));
        let service = LocalCoordinator::new(Arc::new(Coordinator::create(provider)));
        let worker = Worker::new(
            "w",
            service,
            WorkerOptions {
                poll_interval: Duration::from_millis(100),
            },
        );

        for _ in 0..20 {
            let delay = worker.idle_delay();
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    /// Hands out one task, then drops every report as if the connection died
    struct VanishingCoordinator {
        task: std::sync::Mutex<Option<Task<Probe>>>,
    }

    #[async_trait::async_trait]
    impl CoordinatorService<Probe> for VanishingCoordinator {
        async fn pull(&self) -> crate::error::TransportResult<Option<Task<Probe>>> {
            Ok(self.task.lock().unwrap().take())
        }

        async fn finish(&self, _task: Task<Probe>) -> crate::error::TransportResult<()> {
            Err(TransportError::Closed)
        }
    }

    #[tokio::test]
    async fn test_lost_report_ends_loop_cleanly() {
        let service = VanishingCoordinator {
            task: std::sync::Mutex::new(Some(Task::new(value("late copy")))),
        };

        let summary = Worker::new("w", service, fast()).run::<Probe>().await.unwrap();

        assert_eq!(summary.executed, 1);
        assert_eq!(summary.lost_reports, 1);
    }

    #[tokio::test]
    async fn test_failed_loop_does_not_abort_siblings() {
        let finished = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let mut set = JoinSet::new();

        set.spawn(async { Err(anyhow::anyhow!("connection refused")) });
        let flag = finished.clone();
        set.spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(WorkerSummary::default())
        });

        let result = collect(set).await;

        assert!(result.is_err());
        assert!(finished.load(std::sync::atomic::Ordering::SeqCst));
    }
}
