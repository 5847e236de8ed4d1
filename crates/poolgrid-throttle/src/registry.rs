//! Lock registry — key enumeration with glob-style patterns.
//!
//! Only key names are read; lock values are never inspected.

use std::collections::BTreeSet;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use regex::Regex;

use crate::error::{ThrottleError, ThrottleResult};

/// External registry holding throttle lock keys.
pub trait LockRegistry: Send + Sync {
    /// Return every key matching a glob pattern (`*` and `?` wildcards).
    fn scan(&self, pattern: &str) -> ThrottleResult<Vec<String>>;
}

/// Compile a glob pattern into an anchored regex.
pub fn glob_to_regex(pattern: &str) -> ThrottleResult<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            c => expr.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| ThrottleError::InvalidPattern(e.to_string()))
}

/// In-process registry. Availability can be toggled to simulate outages.
#[derive(Debug)]
pub struct InMemoryLockRegistry {
    keys: RwLock<BTreeSet<String>>,
    available: AtomicBool,
}

impl InMemoryLockRegistry {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(BTreeSet::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Build a registry pre-populated with keys.
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: RwLock::new(keys.into_iter().map(Into::<String>::into).collect()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }
}

impl Default for InMemoryLockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LockRegistry for InMemoryLockRegistry {
    fn scan(&self, pattern: &str) -> ThrottleResult<Vec<String>> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(ThrottleError::RegistryUnavailable(
                "registry offline".to_string(),
            ));
        }
        let matcher = glob_to_regex(pattern)?;
        let keys = self
            .keys
            .read()
            .map_err(|e| ThrottleError::RegistryUnavailable(e.to_string()))?;
        Ok(keys.iter().filter(|k| matcher.is_match(k)).cloned().collect())
    }
}
