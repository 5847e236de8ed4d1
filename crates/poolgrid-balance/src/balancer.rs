//! Balancer — runs allocate-then-converge cycles for one supervisor.
//!
//! A cycle reads every queue's metrics up front, so a metrics failure
//! aborts before any pool is scaled. Throttle overrides are optional: if
//! the lock registry cannot be read the cycle continues on the allocator's
//! output alone.
//!
//! Exactly one cycle per supervisor may be in flight; `balance` takes
//! `&mut self` and the timer loop runs cycles sequentially.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use poolgrid_metrics::MetricsAccessor;
use poolgrid_throttle::OverrideResolver;

use crate::allocator::{AllocationBranch, allocate};
use crate::convergence::converge;
use crate::error::{BalanceError, BalanceResult};
use crate::supervisor::{ProcessPool, Supervisor};

/// Outcome for a single pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "target", rename_all = "snake_case")]
pub enum ScaleDecision {
    /// Scale to the specified process count.
    ScaleTo(u32),
    /// No change needed.
    NoChange,
}

/// One pool's step within a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolDecision {
    pub queue: String,
    /// Allocator output before rounding.
    pub ideal: f64,
    /// Forced count from an active throttle group.
    pub override_count: Option<u32>,
    pub desired: u32,
    pub from: u32,
    pub decision: ScaleDecision,
}

/// Everything one cycle decided, in processing order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub branch: AllocationBranch,
    /// False when the lock registry could not be read.
    pub overrides_resolved: bool,
    pub pools: Vec<PoolDecision>,
    /// Live processes across the supervisor after the cycle.
    pub total_processes: u32,
}

impl CycleReport {
    /// Whether any pool was told to scale.
    pub fn scaled(&self) -> bool {
        self.pools
            .iter()
            .any(|p| matches!(p.decision, ScaleDecision::ScaleTo(_)))
    }
}

pub struct Balancer {
    supervisor: Arc<dyn Supervisor>,
    metrics: MetricsAccessor,
    overrides: Option<OverrideResolver>,
    /// When a cycle last scaled something (cooldown tracking).
    last_scaled: Option<Instant>,
}

impl Balancer {
    pub fn new(supervisor: Arc<dyn Supervisor>, metrics: MetricsAccessor) -> Self {
        Self {
            supervisor,
            metrics,
            overrides: None,
            last_scaled: None,
        }
    }

    /// Apply throttle-group overrides from `resolver` on every cycle.
    pub fn with_overrides(mut self, resolver: OverrideResolver) -> Self {
        self.overrides = Some(resolver);
        self
    }

    /// Run one balance cycle.
    pub fn balance(&mut self) -> BalanceResult<CycleReport> {
        let supervisor = self.supervisor.clone();
        let options = supervisor.options();
        let pools = supervisor.process_pools();
        options.validate(pools.len())?;
        ensure_unique_queues(pools)?;

        supervisor.prune_terminating_processes();

        let estimates = self
            .metrics
            .estimate_all(&options.connection, pools.iter().map(|p| p.queue()))?;
        let allocation = allocate(&estimates, options)?;
        let (overrides, overrides_resolved) = self.resolve_overrides();

        let by_queue: HashMap<&str, &Arc<dyn ProcessPool>> =
            pools.iter().map(|p| (p.queue(), p)).collect();
        let mut total = supervisor.total_process_count();
        let mut decisions = Vec::with_capacity(allocation.ideal.len());

        for (queue, ideal) in &allocation.ideal {
            let Some(pool) = by_queue.get(queue.as_str()) else {
                continue;
            };
            let current = pool.total_process_count();
            let override_count = overrides.get(queue).copied();
            let desired = override_count.unwrap_or_else(|| ideal.ceil() as u32);
            let next = converge(current, total, desired, pools.len(), options);

            let decision = if next != current {
                pool.scale(next);
                total = total.saturating_sub(current).saturating_add(next);
                info!(%queue, from = current, to = next, desired, "pool scaled");
                ScaleDecision::ScaleTo(next)
            } else {
                debug!(%queue, current, desired, ideal, "pool unchanged");
                ScaleDecision::NoChange
            };

            decisions.push(PoolDecision {
                queue: queue.clone(),
                ideal: *ideal,
                override_count,
                desired,
                from: current,
                decision,
            });
        }

        Ok(CycleReport {
            branch: allocation.branch,
            overrides_resolved,
            pools: decisions,
            total_processes: total,
        })
    }

    /// Run a cycle unless the cooldown since the last scaling cycle is
    /// still running. Returns `None` when skipped.
    pub fn balance_if_due(&mut self, now: Instant) -> BalanceResult<Option<CycleReport>> {
        let cooldown = self.supervisor.options().balance_cooldown();
        if let Some(last) = self.last_scaled
            && now.saturating_duration_since(last) < cooldown
        {
            debug!(cooldown_secs = cooldown.as_secs(), "balance cooldown active");
            return Ok(None);
        }

        let report = self.balance()?;
        if report.scaled() {
            self.last_scaled = Some(now);
        }
        Ok(Some(report))
    }

    /// Run the balance loop until shutdown.
    pub async fn run(
        &mut self,
        interval: Duration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        info!(
            interval_ms = interval.as_millis() as u64,
            "balancer started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.balance_if_due(Instant::now()) {
                        tracing::error!(error = %e, "balance cycle abandoned");
                    }
                }
                _ = shutdown.changed() => {
                    info!("balancer shutting down");
                    break;
                }
            }
        }
    }

    fn resolve_overrides(&self) -> (BTreeMap<String, u32>, bool) {
        let Some(resolver) = &self.overrides else {
            return (BTreeMap::new(), true);
        };
        match resolver.resolve() {
            Ok(overrides) => (overrides, true),
            Err(e) => {
                warn!(error = %e, "throttle overrides unavailable, using allocation only");
                (BTreeMap::new(), false)
            }
        }
    }
}

/// One pool per queue: a repeated name would be stepped twice per cycle.
fn ensure_unique_queues(pools: &[Arc<dyn ProcessPool>]) -> BalanceResult<()> {
    let mut seen = HashSet::with_capacity(pools.len());
    for pool in pools {
        if !seen.insert(pool.queue()) {
            return Err(BalanceError::Configuration(format!(
                "queue {} is served by more than one pool",
                pool.queue()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalSupervisor;
    use crate::options::SupervisorOptions;
    use poolgrid_metrics::{InMemoryBacklog, RuntimeTracker};
    use poolgrid_throttle::{InMemoryLockRegistry, RegistryThrottleSource};

    struct Fixture {
        supervisor: Arc<LocalSupervisor>,
        backlog: Arc<InMemoryBacklog>,
        runtime: Arc<RuntimeTracker>,
    }

    impl Fixture {
        fn new(options: SupervisorOptions, pools: &[(&str, u32)]) -> Self {
            let mut supervisor = LocalSupervisor::new(options);
            for (queue, processes) in pools {
                supervisor.add_pool(queue, *processes);
            }
            Self {
                supervisor: Arc::new(supervisor),
                backlog: Arc::new(InMemoryBacklog::new()),
                runtime: Arc::new(RuntimeTracker::new(10)),
            }
        }

        fn queue(&self, queue: &str, size: u64, runtime_ms: f64) {
            self.backlog.set("default", queue, size).unwrap();
            self.runtime.record(queue, runtime_ms).unwrap();
        }

        fn balancer(&self) -> Balancer {
            Balancer::new(
                self.supervisor.clone(),
                MetricsAccessor::new(self.backlog.clone(), self.runtime.clone()),
            )
        }

        fn count(&self, queue: &str) -> u32 {
            self.supervisor.pool(queue).unwrap().total_process_count()
        }
    }

    fn options(min: u32, max: u32, shift: u32) -> SupervisorOptions {
        SupervisorOptions {
            min_processes: min,
            max_processes: max,
            balance_max_shift: shift,
            ..Default::default()
        }
    }

    #[test]
    fn proportional_scenario_converges_in_bounded_steps() {
        let fx = Fixture::new(options(1, 10, 5), &[("a", 1), ("b", 5)]);
        fx.queue("a", 100, 2.0);
        fx.queue("b", 10, 1.0);
        let mut balancer = fx.balancer();

        let report = balancer.balance().unwrap();
        assert_eq!(report.branch, AllocationBranch::Proportional);
        // b has the smaller ideal and is settled first.
        assert_eq!(report.pools[0].queue, "b");
        assert_eq!(fx.count("b"), 1);
        assert_eq!(fx.count("a"), 6);

        balancer.balance().unwrap();
        // a is capped at budget minus b's floor.
        assert_eq!(fx.count("a"), 9);
        assert_eq!(fx.count("b"), 1);

        let report = balancer.balance().unwrap();
        assert!(!report.scaled());
    }

    #[test]
    fn equal_counts_issue_no_scale_calls() {
        let fx = Fixture::new(options(1, 10, 5), &[("a", 5), ("b", 5)]);
        fx.queue("a", 10, 1.0);
        fx.queue("b", 10, 1.0);

        let report = fx.balancer().balance().unwrap();
        assert!(!report.scaled());
        assert_eq!(fx.supervisor.pool("a").unwrap().scale_calls(), 0);
        assert_eq!(fx.supervisor.pool("b").unwrap().scale_calls(), 0);
    }

    #[test]
    fn idle_queues_fall_to_floor() {
        let fx = Fixture::new(options(1, 10, 5), &[("a", 3), ("b", 3), ("c", 3)]);

        let report = fx.balancer().balance().unwrap();
        assert_eq!(report.branch, AllocationBranch::Binary);
        assert_eq!(
            fx.supervisor.counts(),
            vec![("a".into(), 1), ("b".into(), 1), ("c".into(), 1)]
        );
    }

    #[test]
    fn override_replaces_allocation() {
        let fx = Fixture::new(options(1, 10, 5), &[("ws-42", 1), ("default", 1)]);
        fx.queue("default", 100, 10.0);
        let registry = InMemoryLockRegistry::with_keys([
            "ws-42-job7:throttle:a",
            "ws-42-job8:throttle:b",
            "ws-42-job9:throttle:c",
        ]);
        let source = RegistryThrottleSource::new(registry, "", "throttle").unwrap();
        let mut balancer = fx
            .balancer()
            .with_overrides(OverrideResolver::new(Arc::new(source)));

        let report = balancer.balance().unwrap();
        let ws = report.pools.iter().find(|p| p.queue == "ws-42").unwrap();
        assert_eq!(ws.override_count, Some(3));
        assert_eq!(ws.desired, 3);
        assert_eq!(fx.count("ws-42"), 3);
    }

    #[test]
    fn registry_outage_is_soft() {
        let fx = Fixture::new(options(1, 10, 5), &[("ws-1", 1), ("default", 1)]);
        fx.queue("default", 10, 1.0);
        let registry = InMemoryLockRegistry::with_keys(["ws-1:throttle:a"]);
        registry.set_available(false);
        let source = RegistryThrottleSource::new(registry, "", "throttle").unwrap();
        let mut balancer = fx
            .balancer()
            .with_overrides(OverrideResolver::new(Arc::new(source)));

        let report = balancer.balance().unwrap();
        assert!(!report.overrides_resolved);
        assert!(report.pools.iter().all(|p| p.override_count.is_none()));
        assert_eq!(fx.count("default"), 6);
    }

    #[test]
    fn empty_idle_pool_is_raised_to_floor() {
        let fx = Fixture::new(options(1, 10, 5), &[("busy", 1), ("idle", 0)]);
        fx.queue("busy", 100, 2.0);
        let mut balancer = fx.balancer();

        for _ in 0..5 {
            balancer.balance().unwrap();
        }

        assert_eq!(fx.count("idle"), 1);
        assert_eq!(fx.count("busy"), 9);
    }

    #[test]
    fn duplicate_queue_names_are_rejected() {
        let fx = Fixture::new(options(1, 10, 2), &[("a", 1), ("a", 1)]);
        fx.queue("a", 10, 0.0);

        let err = fx.balancer().balance().unwrap_err();
        assert!(matches!(err, BalanceError::Configuration(_)));
        assert_eq!(
            fx.supervisor.counts(),
            vec![("a".to_string(), 1), ("a".to_string(), 1)]
        );
    }

    #[test]
    fn inconsistent_options_abort_before_scaling() {
        let fx = Fixture::new(options(6, 10, 5), &[("a", 1), ("b", 1)]);
        fx.queue("a", 10, 1.0);

        let err = fx.balancer().balance().unwrap_err();
        assert!(matches!(err, BalanceError::Configuration(_)));
        assert_eq!(fx.supervisor.pool("a").unwrap().scale_calls(), 0);
    }

    #[test]
    fn cooldown_skips_cycles_after_scaling() {
        let mut opts = options(1, 10, 1);
        opts.balance_cooldown_secs = 5;
        let fx = Fixture::new(opts, &[("a", 1), ("b", 1)]);
        fx.queue("a", 50, 1.0);
        let mut balancer = fx.balancer();

        let start = Instant::now();
        assert!(balancer.balance_if_due(start).unwrap().is_some());
        assert_eq!(fx.count("a"), 2);

        assert!(balancer.balance_if_due(start + Duration::from_secs(2)).unwrap().is_none());
        assert_eq!(fx.count("a"), 2);

        assert!(balancer.balance_if_due(start + Duration::from_secs(5)).unwrap().is_some());
        assert_eq!(fx.count("a"), 3);
    }

    #[test]
    fn report_serializes_to_json() {
        let fx = Fixture::new(options(1, 10, 5), &[("a", 1)]);
        fx.queue("a", 10, 1.0);

        let report = fx.balancer().balance().unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["branch"], "proportional");
        assert_eq!(json["pools"][0]["decision"]["action"], "scale_to");
        assert_eq!(json["pools"][0]["decision"]["target"], 6);
    }

    #[tokio::test]
    async fn run_loop_balances_until_shutdown() {
        let mut opts = options(1, 10, 2);
        opts.balance_cooldown_secs = 0;
        let fx = Fixture::new(opts, &[("a", 1)]);
        fx.queue("a", 10, 1.0);
        let mut balancer = fx.balancer();

        let (tx, rx) = tokio::sync::watch::channel(false);
        let handle = tokio::spawn(async move {
            balancer.run(Duration::from_millis(5), rx).await;
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(fx.count("a"), 10);
    }
}
