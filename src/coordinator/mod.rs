//! Task coordinator
//!
//! Holds the authoritative set of outstanding tasks and hands them out to
//! pollers one at a time.
//!
//! # Queues
//!
//! - `pending`: tasks never handed out, in submission order
//! - `inflight`: tasks handed out at least once and not yet finished, in
//!   order of their most recent hand-out
//!
//! A task lives in at most one of the two queues and leaves `inflight` the
//! first time a finish for it arrives.
//!
//! # Hedging
//!
//! Once `pending` is empty, `pull` keeps re-offering in-flight tasks in
//! round-robin order. The coordinator has no view of worker liveness, so
//! every unfinished task stays in circulation until somebody finishes it.
//! Duplicate finishes caused by hedging are dropped: the first one wins.
//!
//! # Locking
//!
//! One mutex guards both queues, the completion flag and the counters. `pull`
//! and `finish` run entirely under it, including provider notification, so
//! the provider sees every outcome before `done()`. A provider callback that
//! panics is logged and otherwise ignored; the queues stay consistent and
//! completion is still signalled.

pub mod stats;

pub use stats::CoordinatorStats;

use crate::error::CoordinatorError;
use crate::provider::Provider;
use crate::task::{panic_message, Computation, Outcome, Task, TaskId};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What `finish` did with a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishStatus {
    /// First report for this task; forwarded to the provider
    Recorded,
    /// Task was not in flight (already finished or unknown); dropped
    Duplicate,
}

struct QueueState<C: Computation> {
    pending: VecDeque<Task<C>>,
    inflight: VecDeque<Task<C>>,
    completed: bool,
    stats: CoordinatorStats,
}

/// Pull-based task coordinator
pub struct Coordinator<C: Computation> {
    provider: Arc<dyn Provider<C>>,
    state: Mutex<QueueState<C>>,
}

impl<C: Computation> Coordinator<C> {
    /// Create a coordinator from the provider's initial computations
    ///
    /// Every computation becomes a pending task, in the order the provider
    /// returned them. An empty work list completes immediately.
    pub fn create<P>(provider: Arc<P>) -> Self
    where
        P: Provider<C> + 'static,
    {
        let provider: Arc<dyn Provider<C>> = provider;
        let pending: VecDeque<Task<C>> = provider
            .create_workers()
            .into_iter()
            .map(Task::new)
            .collect();

        let stats = CoordinatorStats {
            submitted: pending.len() as u64,
            ..Default::default()
        };

        tracing::info!(tasks = pending.len(), "coordinator created");

        let coordinator = Self {
            provider,
            state: Mutex::new(QueueState {
                pending,
                inflight: VecDeque::new(),
                completed: false,
                stats,
            }),
        };

        {
            let mut state = coordinator.lock();
            coordinator.check_completion(&mut state);
        }

        coordinator
    }

    /// Hand out the next task, or `None` once nothing is left
    ///
    /// Fresh tasks are served first in FIFO order. After that the oldest
    /// in-flight task is re-offered and moved to the back of the line.
    pub fn pull(&self) -> Option<Task<C>> {
        let mut state = self.lock();

        if let Some(task) = state.pending.pop_front() {
            state.inflight.push_back(task.clone());
            state.stats.dispatched += 1;
            tracing::debug!(task = %task.id(), "dispatched");
            return Some(task);
        }

        let task = state.inflight.pop_front()?;
        state.inflight.push_back(task.clone());
        state.stats.hedged += 1;
        tracing::debug!(task = %task.id(), inflight = state.inflight.len(), "re-offered");
        Some(task)
    }

    /// Accept a task that a worker has run
    ///
    /// Fails only if the task carries no outcome, in which case nothing
    /// changes.
    pub fn finish(&self, task: &Task<C>) -> Result<FinishStatus, CoordinatorError> {
        let outcome = task
            .outcome()
            .cloned()
            .ok_or(CoordinatorError::OutcomeUnset(task.id()))?;
        Ok(self.finish_report(task.id(), outcome))
    }

    /// Accept an outcome for a task id
    ///
    /// The first report for an in-flight task is forwarded to the provider.
    /// Reports for tasks that already finished, or that this coordinator
    /// never issued, are ignored.
    pub fn finish_report(&self, id: TaskId, outcome: Outcome<C::Output>) -> FinishStatus {
        let mut state = self.lock();

        let status = match state.inflight.iter().position(|t| t.id() == id) {
            Some(index) => {
                state.inflight.remove(index);
                match outcome {
                    Outcome::Success { value } => {
                        state.stats.results += 1;
                        tracing::debug!(task = %id, "finished");
                        self.notify("add_result", || self.provider.add_result(value));
                    }
                    Outcome::Failure { description, cause } => {
                        state.stats.crashes += 1;
                        tracing::debug!(task = %id, "crashed");
                        self.notify("add_crash", || {
                            self.provider.add_crash(&description, &cause)
                        });
                    }
                }
                FinishStatus::Recorded
            }
            None => {
                state.stats.duplicates += 1;
                tracing::debug!(task = %id, "duplicate finish dropped");
                FinishStatus::Duplicate
            }
        };

        self.check_completion(&mut state);
        status
    }

    /// True once `done()` has been delivered to the provider
    pub fn is_completed(&self) -> bool {
        self.lock().completed
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn inflight_len(&self) -> usize {
        self.lock().inflight.len()
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.lock().stats
    }

    fn check_completion(&self, state: &mut QueueState<C>) {
        if !state.completed && state.pending.is_empty() && state.inflight.is_empty() {
            state.completed = true;
            tracing::info!(
                results = state.stats.results,
                crashes = state.stats.crashes,
                "all tasks finished"
            );
            self.notify("done", || self.provider.done());
        }
    }

    /// Call into the provider, containing any panic it raises
    fn notify<F: FnOnce()>(&self, callback: &str, f: F) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
            tracing::error!(
                "provider panicked in {}: {}",
                callback,
                panic_message(payload.as_ref())
            );
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CollectingProvider, ProviderEvent};
    use crate::task::testing::{value, Probe};
    use std::collections::HashSet;
    use std::thread;

    fn setup(computations: Vec<Probe>) -> (Arc<CollectingProvider<Probe>>, Coordinator<Probe>) {
        let provider = Arc::new(CollectingProvider::new(computations));
        let coordinator = Coordinator::create(provider.clone());
        (provider, coordinator)
    }

    fn run(mut task: Task<Probe>) -> Task<Probe> {
        task.execute();
        task
    }

    #[test]
    fn test_single_worker_runs_everything() {
        let (provider, coordinator) = setup(vec![value("a"), value("b")]);

        let a = run(coordinator.pull().unwrap());
        assert_eq!(a.computation(), &value("a"));
        assert_eq!(coordinator.finish(&a).unwrap(), FinishStatus::Recorded);

        let b = run(coordinator.pull().unwrap());
        assert_eq!(b.computation(), &value("b"));
        assert_eq!(coordinator.finish(&b).unwrap(), FinishStatus::Recorded);

        assert_eq!(
            provider.events(),
            vec![
                ProviderEvent::Result { value: "a".to_string() },
                ProviderEvent::Result { value: "b".to_string() },
                ProviderEvent::Done,
            ]
        );
        assert!(coordinator.is_completed());
    }

    #[test]
    fn test_crash_is_reported_once_then_done() {
        let (provider, coordinator) = setup(vec![Probe::Error("boom".to_string())]);

        let task = run(coordinator.pull().unwrap());
        let id = task.id();
        coordinator.finish(&task).unwrap();

        let crashes = provider.crashes();
        assert_eq!(crashes.len(), 1);
        assert!(crashes[0].0.contains(&id.to_string()));
        assert_eq!(crashes[0].1, "boom");
        assert_eq!(provider.events().last(), Some(&ProviderEvent::Done));
        assert!(coordinator.pull().is_none());
    }

    #[test]
    fn test_hedge_reoffers_in_dispatch_order() {
        let (provider, coordinator) = setup(vec![value("a"), value("b")]);

        let a = coordinator.pull().unwrap();
        let b = coordinator.pull().unwrap();
        assert_eq!(coordinator.pending_len(), 0);
        assert_eq!(coordinator.inflight_len(), 2);

        // Pending is exhausted: the oldest in-flight task comes back first
        let hedge = coordinator.pull().unwrap();
        assert_eq!(hedge, a);
        assert_eq!(coordinator.pull().unwrap(), b);
        assert_eq!(coordinator.pull().unwrap(), a);

        let a_done = run(a);
        assert_eq!(coordinator.finish(&a_done).unwrap(), FinishStatus::Recorded);

        // The hedged copy finishing later is a no-op
        let hedge_done = run(hedge);
        assert_eq!(coordinator.finish(&hedge_done).unwrap(), FinishStatus::Duplicate);
        assert_eq!(provider.results(), vec!["a".to_string()]);
        assert!(!provider.is_done());

        // Only b remains and it is re-offered on every poll
        for _ in 0..3 {
            assert_eq!(coordinator.pull().unwrap(), b);
        }
        coordinator.finish(&run(b)).unwrap();
        assert_eq!(provider.done_count(), 1);
        assert!(coordinator.pull().is_none());
    }

    #[test]
    fn test_duplicate_finish_forwarded_once() {
        let (provider, coordinator) = setup(vec![value("a")]);
        let task = run(coordinator.pull().unwrap());

        assert_eq!(coordinator.finish(&task).unwrap(), FinishStatus::Recorded);
        assert_eq!(coordinator.finish(&task).unwrap(), FinishStatus::Duplicate);

        assert_eq!(provider.results().len(), 1);
        assert_eq!(provider.done_count(), 1);
        assert_eq!(coordinator.stats().duplicates, 1);
    }

    #[test]
    fn test_empty_provider_completes_immediately() {
        let (provider, coordinator) = setup(Vec::new());
        assert_eq!(provider.events(), vec![ProviderEvent::Done]);
        assert!(coordinator.is_completed());
        assert!(coordinator.pull().is_none());
    }

    #[test]
    fn test_unknown_id_is_noop() {
        let (provider, coordinator) = setup(vec![value("a")]);
        let status = coordinator.finish_report(
            TaskId::generate(),
            Outcome::Success { value: "x".to_string() },
        );
        assert_eq!(status, FinishStatus::Duplicate);
        assert!(provider.events().is_empty());
        assert_eq!(coordinator.pending_len(), 1);
    }

    #[test]
    fn test_unrun_task_rejected() {
        let (provider, coordinator) = setup(vec![value("a")]);
        let task = coordinator.pull().unwrap();
        assert_eq!(
            coordinator.finish(&task),
            Err(CoordinatorError::OutcomeUnset(task.id()))
        );
        assert!(provider.events().is_empty());
        assert_eq!(coordinator.inflight_len(), 1);
    }

    #[test]
    fn test_never_none_while_work_remains() {
        let (_provider, coordinator) = setup(vec![value("a"), value("b"), value("c")]);
        let mut seen = HashSet::new();
        for _ in 0..10 {
            let task = coordinator.pull().expect("work remains");
            seen.insert(task.id());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_stats_track_dispatch_and_hedge() {
        let (_provider, coordinator) = setup(vec![value("a"), value("b")]);
        coordinator.pull();
        coordinator.pull();
        coordinator.pull();

        let stats = coordinator.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.dispatched, 2);
        assert_eq!(stats.hedged, 1);
        assert_eq!(stats.outstanding(), 2);
    }

    #[test]
    fn test_concurrent_workers_each_result_once() {
        let n = 200;
        let computations: Vec<Probe> = (0..n).map(|i| value(&i.to_string())).collect();
        let (provider, coordinator) = setup(computations);
        let coordinator = Arc::new(coordinator);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = coordinator.clone();
                thread::spawn(move || {
                    while let Some(task) = coordinator.pull() {
                        coordinator.finish(&run(task)).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let mut results = provider.results();
        results.sort();
        let mut expected: Vec<String> = (0..n).map(|i| i.to_string()).collect();
        expected.sort();
        assert_eq!(results, expected);
        assert_eq!(provider.done_count(), 1);
        assert_eq!(provider.events().last(), Some(&ProviderEvent::Done));

        let stats = coordinator.stats();
        assert_eq!(stats.results, n as u64);
        assert_eq!(stats.results + stats.duplicates, stats.dispatched + stats.hedged);
    }

    /// Provider whose result and crash callbacks always panic
    struct PanickingProvider {
        computations: Vec<Probe>,
        done: std::sync::atomic::AtomicUsize,
    }

    impl Provider<Probe> for PanickingProvider {
        fn create_workers(&self) -> Vec<Probe> {
            self.computations.clone()
        }

        fn add_result(&self, _value: String) {
            panic!("result sink unavailable");
        }

        fn add_crash(&self, _description: &str, _error: &str) {
            panic!("crash sink unavailable");
        }

        fn done(&self) {
            self.done.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[test]
    fn test_panicking_provider_still_completes() {
        let provider = Arc::new(PanickingProvider {
            computations: vec![value("a"), Probe::Error("boom".to_string())],
            done: Default::default(),
        });
        let coordinator = Coordinator::create(provider.clone());

        let a = run(coordinator.pull().unwrap());
        let b = run(coordinator.pull().unwrap());
        assert_eq!(coordinator.finish(&a).unwrap(), FinishStatus::Recorded);
        assert!(!coordinator.is_completed());
        assert_eq!(coordinator.finish(&b).unwrap(), FinishStatus::Recorded);

        assert!(coordinator.is_completed());
        assert!(coordinator.pull().is_none());
        assert_eq!(provider.done.load(std::sync::atomic::Ordering::SeqCst), 1);

        let stats = coordinator.stats();
        assert_eq!((stats.results, stats.crashes), (1, 1));
    }
}
