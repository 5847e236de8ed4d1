//! Balancer error types.

use thiserror::Error;

/// Result type alias for balancing operations.
pub type BalanceResult<T> = Result<T, BalanceError>;

/// Errors that abort a balance cycle before any pool is scaled.
#[derive(Debug, Error)]
pub enum BalanceError {
    #[error("metrics unavailable: {0}")]
    Metrics(#[from] poolgrid_metrics::MetricsError),

    #[error("inconsistent configuration: {0}")]
    Configuration(String),

    #[error("failed to load options: {0}")]
    Config(String),
}
