//! In-memory backlog source keyed by `(connection, queue)`.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockWriteGuard};

use crate::accessor::BacklogSource;
use crate::error::{MetricsError, MetricsResult};

type ReadyMap = HashMap<(String, String), u64>;

/// Ready counts held in process. Unknown queues report an empty backlog.
#[derive(Debug, Default)]
pub struct InMemoryBacklog {
    ready: RwLock<ReadyMap>,
}

impl InMemoryBacklog {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self, queue: &str) -> MetricsResult<RwLockWriteGuard<'_, ReadyMap>> {
        self.ready.write().map_err(|e| MetricsError::BacklogUnavailable {
            queue: queue.to_string(),
            reason: e.to_string(),
        })
    }

    /// Overwrite the ready count for a queue.
    pub fn set(&self, connection: &str, queue: &str, ready: u64) -> MetricsResult<()> {
        self.write(queue)?
            .insert((connection.to_string(), queue.to_string()), ready);
        Ok(())
    }

    /// Add jobs to a queue's backlog.
    pub fn push(&self, connection: &str, queue: &str, jobs: u64) -> MetricsResult<()> {
        let mut map = self.write(queue)?;
        let entry = map
            .entry((connection.to_string(), queue.to_string()))
            .or_insert(0);
        *entry = entry.saturating_add(jobs);
        Ok(())
    }

    /// Claim up to `jobs` from a queue. Returns how many were claimed.
    pub fn claim(&self, connection: &str, queue: &str, jobs: u64) -> MetricsResult<u64> {
        let mut map = self.write(queue)?;
        Ok(match map.get_mut(&(connection.to_string(), queue.to_string())) {
            Some(ready) => {
                let claimed = jobs.min(*ready);
                *ready -= claimed;
                claimed
            }
            None => 0,
        })
    }
}

impl BacklogSource for InMemoryBacklog {
    fn ready_count(&self, connection: &str, queue: &str) -> MetricsResult<u64> {
        let map = self.ready.read().map_err(|e| MetricsError::BacklogUnavailable {
            queue: queue.to_string(),
            reason: e.to_string(),
        })?;
        Ok(map
            .get(&(connection.to_string(), queue.to_string()))
            .copied()
            .unwrap_or(0))
    }
}
