//! Resource load supervision for Breakwater
//!
//! Embedded game content is hosted in iframes the cache layer cannot
//! intercept, so its failure handling lives here: a per-resource state
//! machine that detects load failure and timeout, retries with exponential
//! backoff after verifying the resource is still reachable, and settles in
//! a terminal Exhausted state once the budget is spent.

pub mod session;
pub mod supervisor;

pub use session::{LoadState, SessionSnapshot};
pub use supervisor::{
    LoadSupervisor, SupervisorConfig, SupervisorError, SupervisorEvent,
};
