//! Allocator — ideal (fractional) worker count per queue.

use serde::{Deserialize, Serialize};
use tracing::debug;

use poolgrid_metrics::ClearTimeEstimate;

use crate::error::{BalanceError, BalanceResult};
use crate::options::{AutoScalingStrategy, SupervisorOptions};

/// Which rule produced an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationBranch {
    /// Autoscaling off: equal split of the budget.
    Disabled,
    /// Share of the budget proportional to the backlog signal.
    Proportional,
    /// No backlog signal: full budget to busy queues, floor to idle ones.
    Binary,
}

/// Ideal worker counts, ascending by value.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub branch: AllocationBranch,
    pub ideal: Vec<(String, f64)>,
}

impl Allocation {
    pub fn get(&self, queue: &str) -> Option<f64> {
        self.ideal.iter().find(|(q, _)| q == queue).map(|(_, v)| *v)
    }

    pub fn total(&self) -> f64 {
        self.ideal.iter().map(|(_, v)| v).sum()
    }
}

/// Compute the ideal worker count for every queue.
///
/// Values are not rounded. Ties keep the input order.
pub fn allocate(
    estimates: &[(String, ClearTimeEstimate)],
    options: &SupervisorOptions,
) -> BalanceResult<Allocation> {
    let max = f64::from(options.max_processes);
    let min = f64::from(options.min_processes);

    let signal = |e: &ClearTimeEstimate| match options.strategy {
        AutoScalingStrategy::Time => e.time,
        AutoScalingStrategy::Size => e.size as f64,
    };
    let total: f64 = estimates.iter().map(|(_, e)| signal(e)).sum();

    let (branch, mut ideal): (AllocationBranch, Vec<(String, f64)>) = if !options.auto_scaling {
        if estimates.is_empty() {
            return Err(BalanceError::Configuration(
                "cannot split the process budget evenly across zero pools".to_string(),
            ));
        }
        let share = max / estimates.len() as f64;
        (
            AllocationBranch::Disabled,
            estimates.iter().map(|(q, _)| (q.clone(), share)).collect(),
        )
    } else if total > 0.0 {
        (
            AllocationBranch::Proportional,
            estimates
                .iter()
                .map(|(q, e)| (q.clone(), signal(e) / total * max))
                .collect(),
        )
    } else {
        (
            AllocationBranch::Binary,
            estimates
                .iter()
                .map(|(q, e)| (q.clone(), if e.size > 0 { max } else { min }))
                .collect(),
        )
    };

    ideal.sort_by(|a, b| a.1.total_cmp(&b.1));

    debug!(?branch, queues = ideal.len(), total_signal = total, "allocation computed");
    Ok(Allocation { branch, ideal })
}
