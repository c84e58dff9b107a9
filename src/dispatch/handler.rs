//! # Work Item Handler
//!
//! Capability contract for processing one work item, plus the shipped
//! per-device actor delivery handler.
//!
//! ## Retry as a Return Value
//!
//! A handler never raises a control-flow failure for a processing refusal.
//! Refusal is expressed by returning [`HandlerOutcome::Retry`] with the same
//! item, making retry a first-class, testable outcome rather than
//! exception-driven control flow. Permanent failures are reported and the
//! item is dropped by returning `Done`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::dispatch::errors::DispatchError;
use crate::dispatch::proxy_cache::{ActorProxyCache, ActorResolver};
use crate::dispatch::work_item::WorkItem;
use crate::trace::TraceSink;

/// Outcome of processing one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The item is finished: delivered, or unrecoverable and already reported.
    Done,
    /// The item should be re-enqueued and attempted again.
    Retry(WorkItem),
}

/// Pluggable processor invoked by dispatch workers.
///
/// Contract:
/// - Must be safe to invoke concurrently from multiple workers.
/// - Transient remote failure (timeout, temporarily unavailable) returns
///   `Retry(item)`.
/// - Permanent/validation failure is reported through the trace sink and the
///   item is dropped by returning `Done`; an unrecoverable item is never
///   retried forever.
#[async_trait]
pub trait WorkItemHandler: Send + Sync {
    /// Process one item, returning `Done` on success or `Retry` to requeue.
    async fn process(&self, item: WorkItem) -> HandlerOutcome;

    /// Handler name for identification in logs and stats
    fn handler_name(&self) -> &'static str;
}

/// Delivers work items to per-device actors resolved through a private
/// [`ActorProxyCache`].
///
/// The cache is an owned resource of this handler instance, never shared
/// mutably across handler instances.
pub struct DeviceEventHandler {
    proxy_cache: ActorProxyCache,
    trace_sink: Arc<dyn TraceSink>,
    call_timeout: Duration,
}

impl DeviceEventHandler {
    /// Create a handler resolving actors through the given runtime collaborator
    pub fn new(
        resolver: Arc<dyn ActorResolver>,
        service_uri: impl Into<String>,
        trace_sink: Arc<dyn TraceSink>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            proxy_cache: ActorProxyCache::new(resolver, service_uri),
            trace_sink,
            call_timeout,
        }
    }

    /// Access the private proxy cache (cardinality inspection)
    pub fn proxy_cache(&self) -> &ActorProxyCache {
        &self.proxy_cache
    }

    fn report_permanent(&self, item: &WorkItem, message: &str) {
        let error = DispatchError::permanent_handler(item.routing_key(), message);
        warn!(
            routing_key = %item.routing_key(),
            item_uuid = %item.item_uuid(),
            error = %error,
            "Dropping unrecoverable work item after reporting"
        );
        self.trace_sink
            .trace_message(&format!("DeviceEventHandler: {error}"));
    }
}

#[async_trait]
impl WorkItemHandler for DeviceEventHandler {
    async fn process(&self, item: WorkItem) -> HandlerOutcome {
        // Resolution failures are transient from this handler's point of view:
        // the runtime may simply not have placed the actor yet.
        let proxy = match self.proxy_cache.resolve(item.routing_key()).await {
            Ok(proxy) => proxy,
            Err(error) => {
                debug!(
                    routing_key = %item.routing_key(),
                    error = %error,
                    "Actor resolution failed, signaling retry"
                );
                self.trace_sink
                    .trace_message(&format!("DeviceEventHandler: retrying after {error}"));
                return HandlerOutcome::Retry(item);
            }
        };

        let call = proxy.post(
            item.publisher(),
            item.source_name(),
            item.source_namespace(),
            item.payload(),
        );

        match timeout(self.call_timeout, call).await {
            Ok(Ok(())) => {
                debug!(
                    routing_key = %item.routing_key(),
                    item_uuid = %item.item_uuid(),
                    "Posted event to device actor"
                );
                HandlerOutcome::Done
            }
            Ok(Err(error)) if error.is_transient() => {
                debug!(
                    routing_key = %item.routing_key(),
                    error = %error,
                    "Transient remote failure, signaling retry"
                );
                HandlerOutcome::Retry(item)
            }
            Ok(Err(error)) => {
                self.report_permanent(&item, &error.to_string());
                HandlerOutcome::Done
            }
            Err(_elapsed) => {
                let error =
                    DispatchError::timeout("actor_post", self.call_timeout.as_millis() as u64);
                debug!(
                    routing_key = %item.routing_key(),
                    error = %error,
                    "Remote call timed out, signaling retry"
                );
                HandlerOutcome::Retry(item)
            }
        }
    }

    fn handler_name(&self) -> &'static str {
        "DeviceEventHandler"
    }
}
