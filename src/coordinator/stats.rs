//! Coordinator counters
//!
//! Purely observational: none of these values influence dispatch.

use serde::{Deserialize, Serialize};

/// Running totals kept under the coordinator lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStats {
    /// Tasks created from the provider's computations
    pub submitted: u64,
    /// First-time hand-outs from the pending queue
    pub dispatched: u64,
    /// Re-offers of tasks that were already in flight
    pub hedged: u64,
    /// Outcomes forwarded through `add_result`
    pub results: u64,
    /// Outcomes forwarded through `add_crash`
    pub crashes: u64,
    /// Finish calls dropped because the task was no longer in flight
    pub duplicates: u64,
}

impl CoordinatorStats {
    /// Tasks whose outcome has reached the provider
    pub fn finished(&self) -> u64 {
        self.results + self.crashes
    }

    /// Tasks not yet finished
    pub fn outstanding(&self) -> u64 {
        self.submitted.saturating_sub(self.finished())
    }
}
