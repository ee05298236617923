//! Providers: where work comes from and where outcomes go
//!
//! A `Provider` supplies the initial set of computations when the coordinator
//! is created, and receives exactly one terminal notification per task plus a
//! single completion signal.

use crate::task::Computation;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

/// Source of work and sink of outcomes
///
/// The coordinator guarantees:
/// - `add_result` or `add_crash` is called at most once per submitted task
/// - `done` is called exactly once, after every task has been reported
///
/// Notifications are delivered while the coordinator holds its lock, so
/// implementations must not call back into the coordinator.
/// A panic inside a notification is caught and logged by the coordinator;
/// the notification is then considered delivered.
pub trait Provider<C: Computation>: Send + Sync {
    /// Initial, finite set of work (may be empty)
    fn create_workers(&self) -> Vec<C>;

    /// A task completed with a value
    fn add_result(&self, value: C::Output);

    /// A task's computation failed
    fn add_crash(&self, description: &str, error: &str);

    /// No pending or in-flight work remains
    fn done(&self);
}

/// One notification received by a `CollectingProvider`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProviderEvent<R> {
    Result { value: R },
    Crash { description: String, error: String },
    Done,
}

/// Provider that hands out a fixed list of computations and records every
/// notification in arrival order
pub struct CollectingProvider<C: Computation> {
    computations: Vec<C>,
    events: Mutex<Vec<ProviderEvent<C::Output>>>,
    done_tx: watch::Sender<bool>,
}

impl<C: Computation> CollectingProvider<C> {
    pub fn new(computations: Vec<C>) -> Self {
        let (done_tx, _) = watch::channel(false);
        Self {
            computations,
            events: Mutex::new(Vec::new()),
            done_tx,
        }
    }

    /// Snapshot of all notifications so far
    pub fn events(&self) -> Vec<ProviderEvent<C::Output>> {
        self.lock_events().clone()
    }

    /// Values delivered through `add_result`, in arrival order
    pub fn results(&self) -> Vec<C::Output> {
        self.lock_events()
            .iter()
            .filter_map(|e| match e {
                ProviderEvent::Result { value } => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    /// `(description, error)` pairs delivered through `add_crash`
    pub fn crashes(&self) -> Vec<(String, String)> {
        self.lock_events()
            .iter()
            .filter_map(|e| match e {
                ProviderEvent::Crash { description, error } => {
                    Some((description.clone(), error.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Number of times `done` has been called
    pub fn done_count(&self) -> usize {
        self.lock_events()
            .iter()
            .filter(|e| matches!(e, ProviderEvent::Done))
            .count()
    }

    pub fn is_done(&self) -> bool {
        *self.done_tx.borrow()
    }

    /// Wait until `done` has been called
    pub async fn wait_done(&self) {
        let mut rx = self.done_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|done| *done).await;
    }

    fn lock_events(&self) -> std::sync::MutexGuard<'_, Vec<ProviderEvent<C::Output>>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Computation> Provider<C> for CollectingProvider<C> {
    fn create_workers(&self) -> Vec<C> {
        self.computations.clone()
    }

    fn add_result(&self, value: C::Output) {
        self.lock_events().push(ProviderEvent::Result { value });
    }

    fn add_crash(&self, description: &str, error: &str) {
        tracing::warn!("{}: {}", description, error);
        self.lock_events().push(ProviderEvent::Crash {
            description: description.to_string(),
            error: error.to_string(),
        });
    }

    fn done(&self) {
        self.lock_events().push(ProviderEvent::Done);
        self.done_tx.send_replace(true);
    }
}
