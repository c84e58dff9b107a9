//! # System Constants
//!
//! Default tuning values for the dispatch pipeline, kept in one place so the
//! configuration layer and tests agree on them.

/// Default bound on the pending work queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default number of concurrent dispatch workers
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default per-remote-call timeout in milliseconds
pub const DEFAULT_REMOTE_CALL_TIMEOUT_MS: u64 = 5_000;

/// Default maximum handler invocations per work item (first attempt included)
pub const DEFAULT_RETRY_LIMIT: u32 = 5;

/// Default base backoff delay in milliseconds
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 200;

/// Default backoff ceiling in milliseconds
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Default exponential backoff multiplier
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// System-level identifiers
pub mod system {
    /// Logical address of the per-device actor service in the actor runtime
    pub const DEFAULT_ACTOR_SERVICE_URI: &str = "fabric:/gateway/DeviceActorService";

    /// Consumer group used when the stream source does not name one
    pub const DEFAULT_CONSUMER_GROUP: &str = "$Default";
}
