//! poolgrid-metrics — backlog and runtime telemetry for queue balancing.
//!
//! Exposes the two external facts the balancer needs per queue (ready
//! backlog size and trailing average job runtime) behind small traits, and
//! combines them into a `ClearTimeEstimate`.
//!
//! # Architecture
//!
//! ```text
//! MetricsAccessor
//!   ├── BacklogSource::ready_count(connection, queue)   → u64
//!   ├── RuntimeSource::average_runtime(queue)           → f64 (ms)
//!   └── estimate(queue) → ClearTimeEstimate { size, time = size × runtime }
//!
//! In-process sources
//!   ├── InMemoryBacklog  (ready counts per connection/queue)
//!   └── RuntimeTracker   (rolling average over recent job runtimes)
//! ```

pub mod accessor;
pub mod backlog;
pub mod error;
pub mod runtime;

pub use accessor::{BacklogSource, ClearTimeEstimate, MetricsAccessor, RuntimeSource};
pub use backlog::InMemoryBacklog;
pub use error::{MetricsError, MetricsResult};
pub use runtime::RuntimeTracker;
