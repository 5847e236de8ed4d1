//! poolgrid-throttle — forced worker counts from active throttle locks.
//!
//! Rate-limit locks live in an external key/value registry. Each lock key
//! starts with an identifier such as `ws-42-job7`; identifiers are grouped
//! by their first two dash-separated segments (`ws-42`) and the number of
//! distinct identifiers per group becomes that group's forced worker count.
//!
//! # Architecture
//!
//! ```text
//! OverrideResolver
//!   └── ThrottleSource::active_throttle_identifiers() → {"ws-42-job7", "ws-42-job8", ...}
//!         └── RegistryThrottleSource<R: LockRegistry>
//!               ├── scan("{namespace}*{marker}*")
//!               └── parse identifier: ^(ws-|sp-)<token>:
//!
//! resolve() → { "ws-42": 2, ... }
//! ```

pub mod error;
pub mod registry;
pub mod resolver;

pub use error::{ThrottleError, ThrottleResult};
pub use registry::{InMemoryLockRegistry, LockRegistry};
pub use resolver::{
    OverrideResolver, RegistryThrottleSource, ThrottleSource, throttle_group,
};
