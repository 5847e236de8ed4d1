//! poolgrid-balance — the supervisor balancing control loop.
//!
//! Decides how many worker processes each queue's pool should run under a
//! fixed process budget, and moves every pool toward that target by
//! bounded steps.
//!
//! # Balance cycle
//!
//! ```text
//! prune terminating processes
//! estimates = MetricsAccessor::estimate_all()          // abort on error
//! ideal     = allocate(estimates, options)             // sorted ascending
//! overrides = OverrideResolver::resolve()              // empty on error
//! total     = supervisor.total_process_count()
//! for (queue, ideal) in ideal:
//!     desired = overrides[queue] or ceil(ideal)
//!     new     = converge(current, total, desired)
//!     if new != current: pool.scale(new); total += new - current
//! ```
//!
//! Pools are visited in ascending order of ideal allocation so that
//! downshifts that free budget run before upshifts that consume it.

pub mod allocator;
pub mod balancer;
pub mod convergence;
pub mod error;
pub mod local;
pub mod options;
pub mod supervisor;

pub use allocator::{Allocation, allocate};
pub use balancer::{Balancer, CycleReport, PoolDecision, ScaleDecision};
pub use convergence::converge;
pub use error::{BalanceError, BalanceResult};
pub use local::{LocalPool, LocalSupervisor};
pub use options::{AutoScalingStrategy, SupervisorOptions};
pub use supervisor::{ProcessPool, Supervisor};
