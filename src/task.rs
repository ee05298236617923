//! Tasks: uniquely identified units of work
//!
//! A `Task` wraps a `Computation` with a stable identity and an outcome slot.
//! Tasks are created by the coordinator, shipped to workers, executed there and
//! shipped back (as an id plus outcome) when they finish.
//!
//! # Identity
//!
//! Equality and hashing use the task id only. Two tasks with the same
//! computation but different ids are distinct, and a task that has been
//! serialized and deserialized compares equal to the original.
//!
//! # Outcome
//!
//! The outcome slot starts unset and is written exactly once, by `execute()`.
//! Errors returned by the computation and panics raised inside it are both
//! captured as `Outcome::Failure`; neither escapes to the caller.

use crate::distributed::CoordinatorService;
use crate::error::{CoordinatorError, TransportResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use uuid::Uuid;

/// A unit of work that can be shipped to a worker and executed there
///
/// Implementations must be fully configured when handed to the coordinator:
/// everything the computation needs travels inside the value itself.
pub trait Computation: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    /// Value produced on success
    type Output: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static;

    /// Run the computation
    fn compute(&self) -> anyhow::Result<Self::Output>;

    /// Short human-readable label used in logs and crash descriptions
    fn label(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Globally unique task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Allocate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for TaskId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal outcome of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome<R> {
    /// The computation returned a value
    Success { value: R },

    /// The computation returned an error or panicked
    Failure {
        /// Which task failed
        description: String,
        /// Rendered error chain or panic message
        cause: String,
    },
}

impl<R> Outcome<R> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure { .. })
    }
}

/// A computation with an identity and an outcome slot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Task<C: Computation> {
    id: TaskId,
    computation: C,
    outcome: Option<Outcome<C::Output>>,
}

impl<C: Computation> Task<C> {
    /// Wrap a computation under a fresh id
    pub fn new(computation: C) -> Self {
        Self::with_id(TaskId::generate(), computation)
    }

    /// Wrap a computation under a known id
    pub fn with_id(id: TaskId, computation: C) -> Self {
        Self {
            id,
            computation,
            outcome: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn computation(&self) -> &C {
        &self.computation
    }

    pub fn outcome(&self) -> Option<&Outcome<C::Output>> {
        self.outcome.as_ref()
    }

    pub fn has_outcome(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.as_ref().is_some_and(Outcome::is_success)
    }

    pub fn is_failure(&self) -> bool {
        self.outcome.as_ref().is_some_and(Outcome::is_failure)
    }

    /// Value produced by a successful run
    pub fn result(&self) -> Option<&C::Output> {
        match &self.outcome {
            Some(Outcome::Success { value }) => Some(value),
            _ => None,
        }
    }

    /// `(description, cause)` of a failed run
    pub fn failure(&self) -> Option<(&str, &str)> {
        match &self.outcome {
            Some(Outcome::Failure { description, cause }) => Some((description, cause)),
            _ => None,
        }
    }

    /// Run the computation and record its outcome
    ///
    /// Does nothing if the outcome is already set, so a task is computed at
    /// most once no matter how often this is called.
    pub fn execute(&mut self) {
        if self.outcome.is_some() {
            return;
        }

        let computation = &self.computation;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| computation.compute())) {
            Ok(Ok(value)) => Outcome::Success { value },
            Ok(Err(err)) => Outcome::Failure {
                description: self.crash_description(),
                cause: format!("{:#}", err),
            },
            Err(payload) => Outcome::Failure {
                description: self.crash_description(),
                cause: format!("panicked: {}", panic_message(payload.as_ref())),
            },
        };

        if let Outcome::Failure { cause, .. } = &outcome {
            tracing::debug!(task = %self.id, %cause, "computation failed");
        }

        self.outcome = Some(outcome);
    }

    /// Execute (if not done yet) and report the outcome to the coordinator
    ///
    /// The computation runs inline on the calling thread. Async callers with
    /// slow computations should `execute` on a blocking thread first and then
    /// call `report`, which is what `Worker` does.
    ///
    /// A failing computation is reported like any other outcome. A failure
    /// to deliver the report is returned to the caller and is fatal: the
    /// worker cannot tell whether the coordinator recorded the outcome.
    pub async fn run<S>(mut self, coordinator: &S) -> TransportResult<()>
    where
        S: CoordinatorService<C> + ?Sized,
    {
        self.execute();
        self.report(coordinator).await
    }

    /// Send an already executed task to the coordinator
    ///
    /// Never computes anything. A task without an outcome is rejected before
    /// it reaches the coordinator.
    pub async fn report<S>(self, coordinator: &S) -> TransportResult<()>
    where
        S: CoordinatorService<C> + ?Sized,
    {
        if self.outcome.is_none() {
            return Err(CoordinatorError::OutcomeUnset(self.id).into());
        }
        coordinator.finish(self).await
    }

    /// Split a finished task into the id and outcome that travel back to the
    /// coordinator
    pub fn into_report(self) -> Result<(TaskId, Outcome<C::Output>), CoordinatorError> {
        match self.outcome {
            Some(outcome) => Ok((self.id, outcome)),
            None => Err(CoordinatorError::OutcomeUnset(self.id)),
        }
    }

    fn crash_description(&self) -> String {
        format!("Task {} ({}) failed", self.id, self.computation.label())
    }
}

impl<C: Computation> PartialEq for Task<C> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<C: Computation> Eq for Task<C> {}

impl<C: Computation> Hash for Task<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
