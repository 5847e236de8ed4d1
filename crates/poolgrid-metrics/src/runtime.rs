//! Runtime tracker — rolling average of job runtimes per queue.
//!
//! Keeps the most recent `window` samples for each queue. Queues with no
//! samples report an average of `0.0`, which the balancer reads as "no
//! timing signal".

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use tracing::debug;

use crate::accessor::RuntimeSource;
use crate::error::{MetricsError, MetricsResult};

/// Default number of samples kept per queue.
pub const DEFAULT_WINDOW: usize = 50;

#[derive(Debug)]
pub struct RuntimeTracker {
    window: usize,
    samples: RwLock<HashMap<String, VecDeque<f64>>>,
}

impl RuntimeTracker {
    /// Create a tracker keeping at most `window` samples per queue.
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            samples: RwLock::new(HashMap::new()),
        }
    }

    fn unavailable<E: std::fmt::Display>(queue: &str, e: E) -> MetricsError {
        MetricsError::RuntimeUnavailable {
            queue: queue.to_string(),
            reason: e.to_string(),
        }
    }

    /// Record a completed job's runtime in milliseconds.
    ///
    /// Negative and non-finite values are ignored.
    pub fn record(&self, queue: &str, runtime_ms: f64) -> MetricsResult<()> {
        if !runtime_ms.is_finite() || runtime_ms < 0.0 {
            debug!(%queue, runtime_ms, "ignoring invalid runtime sample");
            return Ok(());
        }
        let mut samples = self
            .samples
            .write()
            .map_err(|e| Self::unavailable(queue, e))?;
        let queue_samples = samples.entry(queue.to_string()).or_default();
        if queue_samples.len() == self.window {
            queue_samples.pop_front();
        }
        queue_samples.push_back(runtime_ms);
        Ok(())
    }

    /// Number of samples currently held for a queue.
    pub fn sample_count(&self, queue: &str) -> MetricsResult<usize> {
        let samples = self
            .samples
            .read()
            .map_err(|e| Self::unavailable(queue, e))?;
        Ok(samples.get(queue).map_or(0, VecDeque::len))
    }

    /// Drop all samples for a queue.
    pub fn forget(&self, queue: &str) -> MetricsResult<()> {
        self.samples
            .write()
            .map_err(|e| Self::unavailable(queue, e))?
            .remove(queue);
        Ok(())
    }
}

impl Default for RuntimeTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl RuntimeSource for RuntimeTracker {
    fn average_runtime(&self, queue: &str) -> MetricsResult<f64> {
        let samples = self
            .samples
            .read()
            .map_err(|e| Self::unavailable(queue, e))?;
        Ok(match samples.get(queue) {
            Some(s) if !s.is_empty() => s.iter().sum::<f64>() / s.len() as f64,
            _ => 0.0,
        })
    }
}
