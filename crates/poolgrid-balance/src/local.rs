//! In-process supervisor whose pools only track counts.
//!
//! Used by the dry-run simulator and tests. `scale` applies the target to
//! the live count at once; processes removed by a scale-down are held as
//! terminating until pruned.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::debug;

use crate::options::SupervisorOptions;
use crate::supervisor::{ProcessPool, Supervisor};

#[derive(Debug)]
pub struct LocalPool {
    queue: String,
    live: AtomicU32,
    terminating: AtomicU32,
    scale_calls: AtomicU32,
}

impl LocalPool {
    pub fn new(queue: impl Into<String>, processes: u32) -> Self {
        Self {
            queue: queue.into(),
            live: AtomicU32::new(processes),
            terminating: AtomicU32::new(0),
            scale_calls: AtomicU32::new(0),
        }
    }

    /// Processes told to stop but not yet pruned.
    pub fn terminating_count(&self) -> u32 {
        self.terminating.load(Ordering::Relaxed)
    }

    /// Number of `scale` calls received.
    pub fn scale_calls(&self) -> u32 {
        self.scale_calls.load(Ordering::Relaxed)
    }

    /// Overwrite the live count, as an external process event would.
    pub fn set_live(&self, processes: u32) {
        self.live.store(processes, Ordering::Relaxed);
    }

    fn prune(&self) -> u32 {
        self.terminating.swap(0, Ordering::Relaxed)
    }
}

impl ProcessPool for LocalPool {
    fn queue(&self) -> &str {
        &self.queue
    }

    fn total_process_count(&self) -> u32 {
        self.live.load(Ordering::Relaxed)
    }

    fn scale(&self, target: u32) {
        self.scale_calls.fetch_add(1, Ordering::Relaxed);
        let previous = self.live.swap(target, Ordering::Relaxed);
        if target < previous {
            self.terminating
                .fetch_add(previous - target, Ordering::Relaxed);
        }
        debug!(queue = %self.queue, from = previous, to = target, "local pool scaled");
    }
}

pub struct LocalSupervisor {
    options: SupervisorOptions,
    local: Vec<Arc<LocalPool>>,
    pools: Vec<Arc<dyn ProcessPool>>,
}

impl LocalSupervisor {
    pub fn new(options: SupervisorOptions) -> Self {
        Self {
            options,
            local: Vec::new(),
            pools: Vec::new(),
        }
    }

    /// Add a pool for `queue` starting at `processes` live workers.
    pub fn with_pool(mut self, queue: &str, processes: u32) -> Self {
        self.add_pool(queue, processes);
        self
    }

    pub fn add_pool(&mut self, queue: &str, processes: u32) -> Arc<LocalPool> {
        let pool = Arc::new(LocalPool::new(queue, processes));
        self.local.push(pool.clone());
        self.pools.push(pool.clone());
        pool
    }

    pub fn pool(&self, queue: &str) -> Option<&Arc<LocalPool>> {
        self.local.iter().find(|p| p.queue == queue)
    }

    /// `(queue, live processes)` in configuration order.
    pub fn counts(&self) -> Vec<(String, u32)> {
        self.local
            .iter()
            .map(|p| (p.queue.clone(), p.total_process_count()))
            .collect()
    }
}

impl Supervisor for LocalSupervisor {
    fn options(&self) -> &SupervisorOptions {
        &self.options
    }

    fn process_pools(&self) -> &[Arc<dyn ProcessPool>] {
        &self.pools
    }

    fn prune_terminating_processes(&self) {
        let pruned: u32 = self.local.iter().map(|p| p.prune()).sum();
        if pruned > 0 {
            debug!(pruned, "terminating processes pruned");
        }
    }
}
