//! # Event Ingress Adapter
//!
//! Boundary component translating raw stream-source events into work items
//! and handing them to the dispatcher.
//!
//! The stream source itself (partitioning, checkpointing, consumer groups) is
//! an external collaborator; this adapter only implements the receiving side
//! of its delivery contract. Ingress failures are reported through the trace
//! sink and surfaced to the caller, never silently dropped.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::constants;
use crate::dispatch::errors::DispatchResult;
use crate::dispatch::work_item::WorkItem;
use crate::dispatch::work_manager::WorkManager;
use crate::trace::TraceSink;

/// Raw event record as delivered by the stream source.
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// Publisher identifier of the originating device
    pub publisher: String,
    /// Opaque serialized event body
    pub body: Vec<u8>,
}

impl RawEvent {
    /// Create a raw event
    pub fn new(publisher: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            publisher: publisher.into(),
            body,
        }
    }
}

/// External-facing entry point converting inbound events into enqueued work.
pub struct EventIngressAdapter {
    work_manager: Arc<WorkManager>,
    trace_sink: Arc<dyn TraceSink>,
}

impl EventIngressAdapter {
    /// Create an adapter feeding the given dispatcher
    pub fn new(work_manager: Arc<WorkManager>, trace_sink: Arc<dyn TraceSink>) -> Self {
        Self {
            work_manager,
            trace_sink,
        }
    }

    /// Translate one raw event plus its provenance into a work item and
    /// enqueue it. Side effect: queue depth increases by one.
    ///
    /// Fails on malformed events (`Validation`) or at queue capacity
    /// (`QueueFull`); both are reported before being returned. An unnamed
    /// consumer group falls back to the runtime-wide default.
    pub fn handle_event_data(
        &self,
        source_namespace: &str,
        source_name: &str,
        consumer_group: &str,
        event: RawEvent,
    ) -> DispatchResult<()> {
        let consumer_group = effective_consumer_group(consumer_group);
        let item = match WorkItem::new(
            event.publisher,
            source_name,
            source_namespace,
            event.body,
        ) {
            Ok(item) => item,
            Err(error) => {
                warn!(
                    source_namespace = %source_namespace,
                    source_name = %source_name,
                    consumer_group = %consumer_group,
                    error = %error,
                    "Rejected malformed inbound event"
                );
                self.trace_sink
                    .trace_message(&format!("EventIngressAdapter: {error}"));
                return Err(error);
            }
        };

        debug!(
            item_uuid = %item.item_uuid(),
            routing_key = %item.routing_key(),
            source_name = %source_name,
            consumer_group = %consumer_group,
            payload_bytes = item.payload().len(),
            "Accepted inbound event"
        );

        self.work_manager.enqueue(item).inspect_err(|error| {
            warn!(
                source_namespace = %source_namespace,
                source_name = %source_name,
                error = %error,
                "Failed to enqueue inbound event"
            );
            self.trace_sink
                .trace_message(&format!("EventIngressAdapter: {error}"));
        })
    }
}

/// Substitute the runtime-wide default consumer group when the stream source
/// does not name one.
fn effective_consumer_group(consumer_group: &str) -> &str {
    if consumer_group.trim().is_empty() {
        constants::system::DEFAULT_CONSUMER_GROUP
    } else {
        consumer_group
    }
}
