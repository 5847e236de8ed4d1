//! Scenario files — a supervisor, its queues, and optional throttle locks.
//!
//! ```toml
//! [supervisor]
//! connection = "redis"
//! max_processes = 10
//! balance_max_shift = 5
//!
//! [[queues]]
//! name = "default"
//! backlog = 100
//! avg_runtime_ms = 2.0
//! processes = 1
//! arrivals = 10
//! jobs_per_process = 4
//!
//! [throttle]
//! marker = "throttle"
//! keys = ["ws-42-job7:throttle:a"]
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;

use tracing::debug;

use poolgrid_balance::{Balancer, LocalSupervisor, ProcessPool, SupervisorOptions};
use poolgrid_metrics::{BacklogSource, InMemoryBacklog, MetricsAccessor, RuntimeTracker};
use poolgrid_throttle::{InMemoryLockRegistry, OverrideResolver, RegistryThrottleSource};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub supervisor: SupervisorOptions,
    #[serde(default)]
    pub queues: Vec<QueueScenario>,
    pub throttle: Option<ThrottleScenario>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueScenario {
    pub name: String,
    #[serde(default)]
    pub backlog: u64,
    /// Omitted means no runtime samples yet.
    pub avg_runtime_ms: Option<f64>,
    #[serde(default)]
    pub processes: u32,
    /// Jobs added to the backlog after every cycle.
    #[serde(default)]
    pub arrivals: u64,
    /// Jobs each live process drains after every cycle.
    #[serde(default)]
    pub jobs_per_process: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleScenario {
    #[serde(default)]
    pub namespace: String,
    #[serde(default = "default_marker")]
    pub marker: String,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_marker() -> String {
    poolgrid_throttle::resolver::DEFAULT_LOCK_MARKER.to_string()
}

fn default_available() -> bool {
    true
}

/// A scenario wired to in-process collaborators.
pub struct Simulation {
    pub supervisor: Arc<LocalSupervisor>,
    pub balancer: Balancer,
    pub backlog: Arc<InMemoryBacklog>,
    connection: String,
    queues: Vec<QueueScenario>,
}

impl Simulation {
    /// Apply one cycle's worth of job arrivals and processing.
    pub fn advance(&self) -> anyhow::Result<()> {
        for queue in &self.queues {
            self.backlog
                .push(&self.connection, &queue.name, queue.arrivals)?;
            let processes = self
                .supervisor
                .pool(&queue.name)
                .map_or(0, |p| p.total_process_count());
            let drained = self.backlog.claim(
                &self.connection,
                &queue.name,
                u64::from(processes).saturating_mul(queue.jobs_per_process),
            )?;
            debug!(queue = %queue.name, arrivals = queue.arrivals, drained, "backlog advanced");
        }
        Ok(())
    }

    /// Ready jobs per queue, in scenario order.
    pub fn backlog_sizes(&self) -> anyhow::Result<Vec<(String, u64)>> {
        self.queues
            .iter()
            .map(|q| {
                let ready = self.backlog.ready_count(&self.connection, &q.name)?;
                Ok((q.name.clone(), ready))
            })
            .collect()
    }
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing scenario {}", path.display()))
    }

    /// Build the supervisor and balancer this scenario describes.
    pub fn build(&self) -> anyhow::Result<Simulation> {
        let connection = &self.supervisor.connection;
        let backlog = Arc::new(InMemoryBacklog::new());
        let runtime = Arc::new(RuntimeTracker::default());

        let mut supervisor = LocalSupervisor::new(self.supervisor.clone());
        for queue in &self.queues {
            supervisor.add_pool(&queue.name, queue.processes);
            backlog.set(connection, &queue.name, queue.backlog)?;
            if let Some(avg) = queue.avg_runtime_ms {
                runtime.record(&queue.name, avg)?;
            }
        }
        let supervisor = Arc::new(supervisor);

        let mut balancer = Balancer::new(
            supervisor.clone(),
            MetricsAccessor::new(backlog.clone(), runtime),
        );
        if let Some(throttle) = &self.throttle {
            let registry = InMemoryLockRegistry::with_keys(throttle.keys.iter().cloned());
            registry.set_available(throttle.available);
            let source = RegistryThrottleSource::new(
                registry,
                throttle.namespace.clone(),
                throttle.marker.clone(),
            )?;
            balancer = balancer.with_overrides(OverrideResolver::new(Arc::new(source)));
        }

        Ok(Simulation {
            supervisor,
            balancer,
            backlog,
            connection: connection.clone(),
            queues: self.queues.clone(),
        })
    }
}
