//! The two-operation service workers talk to
//!
//! `CoordinatorService` is the seam between worker code and transport.
//! `LocalCoordinator` calls straight into an in-process `Coordinator`;
//! `RemoteCoordinator` (see `client`) speaks the TCP protocol.

use crate::coordinator::Coordinator;
use crate::error::TransportResult;
use crate::task::{Computation, Task};
use async_trait::async_trait;
use std::sync::Arc;

/// Remote-callable coordinator operations
#[async_trait]
pub trait CoordinatorService<C: Computation>: Send + Sync {
    /// Next task to execute, or `None` if nothing is available
    async fn pull(&self) -> TransportResult<Option<Task<C>>>;

    /// Report a task that has been executed
    async fn finish(&self, task: Task<C>) -> TransportResult<()>;

    /// Whether the coordinator has reported that all work is finished
    ///
    /// Derived from the last `pull` response; never makes a call itself.
    fn coordinator_completed(&self) -> bool {
        false
    }
}

#[async_trait]
impl<C, S> CoordinatorService<C> for Arc<S>
where
    C: Computation,
    S: CoordinatorService<C> + ?Sized,
{
    async fn pull(&self) -> TransportResult<Option<Task<C>>> {
        (**self).pull().await
    }

    async fn finish(&self, task: Task<C>) -> TransportResult<()> {
        (**self).finish(task).await
    }

    fn coordinator_completed(&self) -> bool {
        (**self).coordinator_completed()
    }
}

/// In-process binding around a shared `Coordinator`
pub struct LocalCoordinator<C: Computation> {
    coordinator: Arc<Coordinator<C>>,
}

impl<C: Computation> LocalCoordinator<C> {
    pub fn new(coordinator: Arc<Coordinator<C>>) -> Self {
        Self { coordinator }
    }
}

impl<C: Computation> Clone for LocalCoordinator<C> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
        }
    }
}

#[async_trait]
impl<C: Computation> CoordinatorService<C> for LocalCoordinator<C> {
    async fn pull(&self) -> TransportResult<Option<Task<C>>> {
        Ok(self.coordinator.pull())
    }

    async fn finish(&self, task: Task<C>) -> TransportResult<()> {
        self.coordinator.finish(&task)?;
        Ok(())
    }

    fn coordinator_completed(&self) -> bool {
        self.coordinator.is_completed()
    }
}
