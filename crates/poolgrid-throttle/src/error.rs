//! Throttle override error types.

use thiserror::Error;

/// Result type alias for throttle operations.
pub type ThrottleResult<T> = Result<T, ThrottleError>;

#[derive(Debug, Error)]
pub enum ThrottleError {
    /// The lock registry could not be queried.
    #[error("lock registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// A scanned key did not carry a throttle identifier.
    #[error("invalid throttle key: {0}")]
    InvalidThrottleKey(String),

    #[error("invalid scan pattern: {0}")]
    InvalidPattern(String),
}
