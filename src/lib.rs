#![allow(clippy::doc_markdown)] // Allow technical terms like IoT, URIs in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Gateway Core
//!
//! Work-item dispatch core for IoT gateway telemetry ingestion: events arrive
//! from a stream source and are routed, exactly-once-per-attempt, to
//! addressable downstream actors such as a per-device analytics actor.
//!
//! ## Overview
//!
//! The pipeline is a classic producer/consumer pool with an explicit retry
//! model. Producers (the ingress adapter, or any caller of the dispatcher)
//! never block on worker availability, only on queue capacity, which is
//! enforced fail-fast. A handler expresses a processing refusal by returning
//! the item as a `Retry` outcome rather than raising an error, so retry is a
//! first-class, testable return value.
//!
//! ## Module Organization
//!
//! - [`dispatch`] - Work items, the dispatcher, handler contracts, proxy cache
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Environment-aware structured logging
//! - [`trace`] - Trace sink boundary toward the tracing collaborator
//! - [`constants`] - Default tuning values
//!
//! ## Delivery Guarantees
//!
//! At-least-once redelivery of a work item while the process is alive, via
//! explicit requeue signaling with exponential backoff and a max-attempt
//! ceiling. Exactly-once end-to-end delivery across process restarts is a
//! non-goal; `stop()` discards pending items by design.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gateway_core::config::GatewayConfig;
//! use gateway_core::dispatch::{
//!     ActorResolver, DeviceEventHandler, EventIngressAdapter, RawEvent, WorkManager,
//! };
//! use gateway_core::trace::TracingTraceSink;
//!
//! # async fn example(resolver: Arc<dyn ActorResolver>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::from_env()?;
//! let trace_sink = Arc::new(TracingTraceSink::new());
//!
//! let handler = Arc::new(DeviceEventHandler::new(
//!     resolver,
//!     config.actor_service_uri.clone(),
//!     trace_sink.clone(),
//!     config.remote_call_timeout(),
//! ));
//!
//! let manager = Arc::new(WorkManager::new(
//!     handler,
//!     trace_sink.clone(),
//!     config.work_manager_config(),
//! )?);
//! manager.start().await?;
//!
//! let ingress = EventIngressAdapter::new(manager.clone(), trace_sink);
//! ingress.handle_event_data(
//!     "iot-ns",
//!     "telemetry-hub",
//!     "$Default",
//!     RawEvent::new("device-42", b"{\"temp\": 21.5}".to_vec()),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod trace;

pub use config::GatewayConfig;
pub use dispatch::{
    ActorProxy, ActorProxyCache, ActorResolver, DeviceEventHandler, DispatchError, DispatchResult,
    DispatchStats, EventIngressAdapter, HandlerOutcome, RawEvent, RetryConfig, WorkItem,
    WorkItemHandler, WorkManager, WorkManagerConfig,
};
pub use error::{GatewayError, Result};
pub use trace::{NullTraceSink, TraceSink, TracingTraceSink};
