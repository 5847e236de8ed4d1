//! Override resolver — turns active throttle identifiers into forced
//! worker counts per throttle group.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::error::{ThrottleError, ThrottleResult};
use crate::registry::LockRegistry;

/// Default infix marking a registry key as a throttle lock.
pub const DEFAULT_LOCK_MARKER: &str = "throttle";

const IDENTIFIER_PATTERN: &str = r"^((?:ws|sp)-[^:]+):";

/// Source of currently active throttle identifiers.
pub trait ThrottleSource: Send + Sync {
    fn active_throttle_identifiers(&self) -> ThrottleResult<BTreeSet<String>>;
}

/// The group an identifier belongs to: its first two dash-separated segments.
///
/// `ws-42-job7` → `ws-42`, `ws-1` → `ws-1`.
pub fn throttle_group(identifier: &str) -> String {
    identifier.splitn(3, '-').take(2).collect::<Vec<_>>().join("-")
}

/// Adapter that discovers identifiers by scanning a `LockRegistry`.
pub struct RegistryThrottleSource<R> {
    registry: R,
    namespace: String,
    marker: String,
    identifier: Regex,
}

impl<R: LockRegistry> RegistryThrottleSource<R> {
    /// Scan keys under `namespace` that contain `marker`.
    pub fn new(
        registry: R,
        namespace: impl Into<String>,
        marker: impl Into<String>,
    ) -> ThrottleResult<Self> {
        let identifier = Regex::new(IDENTIFIER_PATTERN)
            .map_err(|e| ThrottleError::InvalidPattern(e.to_string()))?;
        Ok(Self {
            registry,
            namespace: namespace.into(),
            marker: marker.into(),
            identifier,
        })
    }

    /// The glob pattern passed to the registry.
    pub fn scan_pattern(&self) -> String {
        format!("{}*{}*", self.namespace, self.marker)
    }

    /// Extract the leading `ws-…`/`sp-…` identifier from a lock key.
    pub fn parse_identifier(&self, key: &str) -> ThrottleResult<String> {
        self.identifier
            .captures(key)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| ThrottleError::InvalidThrottleKey(key.to_string()))
    }
}

impl<R: LockRegistry> ThrottleSource for RegistryThrottleSource<R> {
    fn active_throttle_identifiers(&self) -> ThrottleResult<BTreeSet<String>> {
        let keys = self.registry.scan(&self.scan_pattern())?;
        let mut identifiers = BTreeSet::new();

        for key in &keys {
            let local = key.strip_prefix(self.namespace.as_str()).unwrap_or(key);
            match self.parse_identifier(local) {
                Ok(id) => {
                    identifiers.insert(id);
                }
                Err(e) => debug!(error = %e, "skipping throttle key"),
            }
        }

        debug!(
            scanned = keys.len(),
            identifiers = identifiers.len(),
            "throttle identifiers resolved"
        );
        Ok(identifiers)
    }
}

/// Resolves forced worker counts per throttle group.
#[derive(Clone)]
pub struct OverrideResolver {
    source: Arc<dyn ThrottleSource>,
}

impl OverrideResolver {
    pub fn new(source: Arc<dyn ThrottleSource>) -> Self {
        Self { source }
    }

    /// Count distinct active identifiers per throttle group.
    ///
    /// The count replaces the proportional allocation for any pool whose
    /// queue name equals the group.
    pub fn resolve(&self) -> ThrottleResult<BTreeMap<String, u32>> {
        let identifiers = self.source.active_throttle_identifiers()?;
        let mut overrides: BTreeMap<String, u32> = BTreeMap::new();
        for id in &identifiers {
            *overrides.entry(throttle_group(id)).or_insert(0) += 1;
        }
        Ok(overrides)
    }
}
