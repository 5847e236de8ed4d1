//! Control surfaces the balancer drives.
//!
//! Process spawning and termination happen behind these traits; the
//! balancer only reads counts and signals targets.

use std::sync::Arc;

use crate::options::SupervisorOptions;

/// The worker processes serving one queue.
pub trait ProcessPool: Send + Sync {
    /// Name of the queue this pool works.
    fn queue(&self) -> &str;

    /// Live processes, excluding any already terminating.
    fn total_process_count(&self) -> u32;

    /// Signal a new target process count. Returns immediately; actual
    /// processes converge out of band.
    fn scale(&self, target: u32);
}

/// A set of pools sharing one process budget.
pub trait Supervisor: Send + Sync {
    fn options(&self) -> &SupervisorOptions;

    /// Pools in configuration order.
    fn process_pools(&self) -> &[Arc<dyn ProcessPool>];

    /// Live processes across every pool.
    fn total_process_count(&self) -> u32 {
        self.process_pools()
            .iter()
            .map(|p| p.total_process_count())
            .sum()
    }

    /// Drop processes that are mid-shutdown from the counts.
    fn prune_terminating_processes(&self);
}
