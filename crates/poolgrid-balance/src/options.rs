//! Supervisor scaling options.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BalanceError, BalanceResult};

/// Which backlog signal drives the proportional split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoScalingStrategy {
    /// Share of total time to clear (`size × average runtime`).
    #[default]
    Time,
    /// Share of total ready jobs.
    Size,
}

/// Scaling options shared by every pool of one supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorOptions {
    /// Backlog namespace queried for ready counts.
    pub connection: String,
    /// Per-pool process floor.
    pub min_processes: u32,
    /// Process budget shared across all pools (and per-pool ceiling).
    pub max_processes: u32,
    /// Largest process-count change for one pool in one cycle.
    pub balance_max_shift: u32,
    /// When false, the budget is split evenly regardless of backlog.
    pub auto_scaling: bool,
    pub strategy: AutoScalingStrategy,
    /// Minimum seconds between cycles that scaled something.
    pub balance_cooldown_secs: u64,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            connection: "default".to_string(),
            min_processes: 1,
            max_processes: 10,
            balance_max_shift: 1,
            auto_scaling: true,
            strategy: AutoScalingStrategy::Time,
            balance_cooldown_secs: 3,
        }
    }
}

impl SupervisorOptions {
    pub fn from_toml_str(content: &str) -> BalanceResult<Self> {
        toml::from_str(content).map_err(|e| BalanceError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> BalanceResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BalanceError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn balance_cooldown(&self) -> Duration {
        Duration::from_secs(self.balance_cooldown_secs)
    }

    /// Check the options can be honoured for `pool_count` pools.
    pub fn validate(&self, pool_count: usize) -> BalanceResult<()> {
        if self.min_processes > self.max_processes {
            return Err(BalanceError::Configuration(format!(
                "min_processes ({}) exceeds max_processes ({})",
                self.min_processes, self.max_processes
            )));
        }
        if pool_count == 0 && !self.auto_scaling {
            return Err(BalanceError::Configuration(
                "cannot split the process budget evenly across zero pools".to_string(),
            ));
        }
        let floors = u64::from(self.min_processes) * pool_count as u64;
        if floors > u64::from(self.max_processes) {
            return Err(BalanceError::Configuration(format!(
                "{pool_count} pools × min_processes ({}) exceeds max_processes ({})",
                self.min_processes, self.max_processes
            )));
        }
        Ok(())
    }
}
