//! taskpull - pull-based distributed task coordinator
//!
//! A coordinator holds a finite set of tasks. Workers, local or remote, pull
//! one task at a time, execute it and report the outcome back. Nothing is
//! pushed and no worker is ever tracked. Once fresh work runs out, tasks that
//! were handed out but not finished are re-offered to whoever asks next, so a
//! slow or dead worker never stalls the run; the first outcome reported for
//! a task wins.
//!
//! # Architecture
//!
//! - **Task**: a computation plus its outcome, identified by a UUID
//! - **Coordinator**: pending and in-flight queues behind one lock
//! - **Provider**: supplies the work and receives every outcome
//! - **Distributed**: TCP protocol, coordinator server, remote client, worker loops
//! - **Jobs**: the built-in computations the `taskpull` binary runs

pub mod config;
pub mod coordinator;
pub mod distributed;
pub mod error;
pub mod job;
pub mod output;
pub mod provider;
pub mod runner;
pub mod task;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorStats, FinishStatus};
pub use distributed::CoordinatorService;
pub use error::{CoordinatorError, TransportError};
pub use job::Job;
pub use provider::{CollectingProvider, Provider, ProviderEvent};
pub use task::{Computation, Outcome, Task, TaskId};

/// Result type used throughout taskpull
pub type Result<T> = anyhow::Result<T>;
