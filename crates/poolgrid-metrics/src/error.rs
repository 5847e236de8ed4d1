//! Metrics error types.

use thiserror::Error;

/// Result type alias for metrics queries.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Errors raised when a backlog or runtime query cannot be answered.
///
/// Never interpreted as an empty queue: a failed query aborts the balance
/// cycle and the next scheduled cycle retries.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("backlog unavailable for queue {queue}: {reason}")]
    BacklogUnavailable { queue: String, reason: String },

    #[error("runtime unavailable for queue {queue}: {reason}")]
    RuntimeUnavailable { queue: String, reason: String },
}

impl MetricsError {
    /// Whether a later cycle may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MetricsError::BacklogUnavailable { .. } | MetricsError::RuntimeUnavailable { .. }
        )
    }

    /// The queue whose query failed.
    pub fn queue(&self) -> &str {
        match self {
            MetricsError::BacklogUnavailable { queue, .. }
            | MetricsError::RuntimeUnavailable { queue, .. } => queue,
        }
    }
}
