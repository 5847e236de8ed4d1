//! Metrics accessor — derives a time-to-clear estimate per queue.
//!
//! Reads the ready backlog from a `BacklogSource` and the trailing average
//! job runtime from a `RuntimeSource`. The accessor adds no defaults of its
//! own: a runtime source with no samples decides what to return.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MetricsResult;

/// Ready (unclaimed) job counts, namespaced by connection.
///
/// Implementations must be idempotent and side-effect free.
pub trait BacklogSource: Send + Sync {
    fn ready_count(&self, connection: &str, queue: &str) -> MetricsResult<u64>;
}

/// Trailing average job runtime per queue, in milliseconds.
pub trait RuntimeSource: Send + Sync {
    fn average_runtime(&self, queue: &str) -> MetricsResult<f64>;
}

/// Per-cycle estimate of how long a queue's backlog takes to drain.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClearTimeEstimate {
    /// Jobs currently ready on the queue.
    pub size: u64,
    /// `size × average runtime`, in milliseconds.
    pub time: f64,
}

impl ClearTimeEstimate {
    pub fn new(size: u64, average_runtime_ms: f64) -> Self {
        Self {
            size,
            time: size as f64 * average_runtime_ms,
        }
    }
}

/// Read-only view over the backlog and runtime sources.
#[derive(Clone)]
pub struct MetricsAccessor {
    backlog: Arc<dyn BacklogSource>,
    runtime: Arc<dyn RuntimeSource>,
}

impl MetricsAccessor {
    pub fn new(backlog: Arc<dyn BacklogSource>, runtime: Arc<dyn RuntimeSource>) -> Self {
        Self { backlog, runtime }
    }

    /// Estimate the time to clear one queue on the given connection.
    pub fn estimate(&self, connection: &str, queue: &str) -> MetricsResult<ClearTimeEstimate> {
        let size = self.backlog.ready_count(connection, queue)?;
        let runtime = self.runtime.average_runtime(queue)?;
        let estimate = ClearTimeEstimate::new(size, runtime);
        debug!(%queue, %connection, size, runtime_ms = runtime, time_ms = estimate.time, "time to clear");
        Ok(estimate)
    }

    /// Estimate every queue, preserving input order.
    ///
    /// Fails on the first unavailable queue; no partial result is returned.
    pub fn estimate_all<'a, I>(
        &self,
        connection: &str,
        queues: I,
    ) -> MetricsResult<Vec<(String, ClearTimeEstimate)>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut estimates = Vec::new();
        for queue in queues {
            estimates.push((queue.to_string(), self.estimate(connection, queue)?));
        }
        Ok(estimates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backlog::InMemoryBacklog;
    use crate::error::MetricsError;
    use crate::runtime::RuntimeTracker;

    struct FailingBacklog;

    impl BacklogSource for FailingBacklog {
        fn ready_count(&self, _connection: &str, queue: &str) -> MetricsResult<u64> {
            Err(MetricsError::BacklogUnavailable {
                queue: queue.to_string(),
                reason: "connection reset".to_string(),
            })
        }
    }

    fn accessor(backlog: InMemoryBacklog, runtime: RuntimeTracker) -> MetricsAccessor {
        MetricsAccessor::new(Arc::new(backlog), Arc::new(runtime))
    }

    #[test]
    fn estimate_multiplies_size_by_runtime() {
        let backlog = InMemoryBacklog::new();
        backlog.set("redis", "default", 100).unwrap();
        let runtime = RuntimeTracker::new(10);
        runtime.record("default", 2.0).unwrap();

        let est = accessor(backlog, runtime).estimate("redis", "default").unwrap();
        assert_eq!(est.size, 100);
        assert_eq!(est.time, 200.0);
    }

    #[test]
    fn estimate_without_runtime_samples_is_zero_time() {
        let backlog = InMemoryBacklog::new();
        backlog.set("redis", "emails", 7).unwrap();

        let est = accessor(backlog, RuntimeTracker::new(10))
            .estimate("redis", "emails")
            .unwrap();
        assert_eq!(est.size, 7);
        assert_eq!(est.time, 0.0);
    }

    #[test]
    fn estimate_is_scoped_to_connection() {
        let backlog = InMemoryBacklog::new();
        backlog.set("other", "default", 50).unwrap();

        let est = accessor(backlog, RuntimeTracker::new(10))
            .estimate("redis", "default")
            .unwrap();
        assert_eq!(est.size, 0);
    }

    #[test]
    fn backlog_failure_propagates() {
        let accessor = MetricsAccessor::new(Arc::new(FailingBacklog), Arc::new(RuntimeTracker::new(10)));

        let err = accessor.estimate("redis", "default").unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.queue(), "default");
    }

    #[test]
    fn estimate_all_preserves_order() {
        let backlog = InMemoryBacklog::new();
        backlog.set("redis", "b", 1).unwrap();
        backlog.set("redis", "a", 2).unwrap();

        let all = accessor(backlog, RuntimeTracker::new(10))
            .estimate_all("redis", ["b", "a"])
            .unwrap();
        let names: Vec<_> = all.iter().map(|(q, _)| q.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn estimate_all_fails_whole_batch() {
        let accessor = MetricsAccessor::new(Arc::new(FailingBacklog), Arc::new(RuntimeTracker::new(10)));
        assert!(accessor.estimate_all("redis", ["a", "b"]).is_err());
    }
}
