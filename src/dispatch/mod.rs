//! # Dispatch Pipeline
//!
//! Work-item dispatch core: ingestion of telemetry events, a bounded pending
//! queue with a concurrent worker pool, pluggable handler contracts, lazily
//! cached actor proxy resolution, and retry-via-requeue failure handling.
//!
//! ## Core Components
//!
//! - **WorkItem**: immutable envelope carrying a routing key and payload
//! - **WorkItemHandler**: capability contract that processes one item and
//!   returns `Done` or `Retry(item)`
//! - **ActorProxyCache**: per-handler lazily-initialized resolver mapping a
//!   routing key to a cached destination reference
//! - **WorkManager**: the dispatcher owning the queue, the worker pool, and
//!   the requeue loop
//! - **EventIngressAdapter**: boundary component turning raw stream events
//!   into enqueued work items
//!
//! Data flow: ingress adapter → work item construction → enqueue → worker
//! pulls → handler processes → (`Done`: drop) | (`Retry`: requeue after
//! backoff, up to the attempt ceiling).

pub mod errors;
pub mod handler;
pub mod ingress;
pub mod proxy_cache;
pub mod work_item;
pub mod work_manager;

pub use errors::{DispatchError, DispatchResult};
pub use handler::{DeviceEventHandler, HandlerOutcome, WorkItemHandler};
pub use ingress::{EventIngressAdapter, RawEvent};
pub use proxy_cache::{ActorProxy, ActorProxyCache, ActorResolver};
pub use work_item::WorkItem;
pub use work_manager::{DispatchStats, RetryConfig, WorkManager, WorkManagerConfig};
