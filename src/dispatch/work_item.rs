//! # Work Item
//!
//! Immutable envelope for one unit of routed work, derived from a single
//! inbound telemetry event.
//!
//! ## Immutability
//!
//! A `WorkItem` is read-only after construction. Retries re-enqueue the *same*
//! value, never a mutated copy, which preserves idempotent replay semantics for
//! handlers that inspect payload identity. Attempt counts belong to the
//! dispatcher's internal envelope, not to the item.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::dispatch::errors::{DispatchError, DispatchResult};

/// Immutable unit of routed work carrying a routing key and opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    item_uuid: Uuid,
    routing_key: String,
    payload: Vec<u8>,
    publisher: String,
    source_name: String,
    source_namespace: String,
    created_at: DateTime<Utc>,
}

impl WorkItem {
    /// Construct a work item from an event body plus its provenance fields.
    ///
    /// Pure construction: the only failure mode is malformed input, surfaced
    /// as [`DispatchError::Validation`]. The publisher identity becomes the
    /// routing key, since destination actors are addressed per device.
    pub fn new(
        publisher: impl Into<String>,
        source_name: impl Into<String>,
        source_namespace: impl Into<String>,
        payload: Vec<u8>,
    ) -> DispatchResult<Self> {
        let publisher = publisher.into();
        let source_name = source_name.into();
        let source_namespace = source_namespace.into();

        if publisher.trim().is_empty() {
            return Err(DispatchError::validation("publisher must not be empty"));
        }
        if source_name.trim().is_empty() {
            return Err(DispatchError::validation("source name must not be empty"));
        }
        if source_namespace.trim().is_empty() {
            return Err(DispatchError::validation(
                "source namespace must not be empty",
            ));
        }
        if payload.is_empty() {
            return Err(DispatchError::validation("payload must not be empty"));
        }

        Ok(Self {
            item_uuid: Uuid::new_v4(),
            routing_key: publisher.clone(),
            payload,
            publisher,
            source_name,
            source_namespace,
            created_at: Utc::now(),
        })
    }

    /// Unique id stamped at construction, used for tracing and in-flight tracking
    pub fn item_uuid(&self) -> Uuid {
        self.item_uuid
    }

    /// Destination actor identity; stable for the life of the item
    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    /// Opaque serialized event body
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Publisher id copied from the originating event
    pub fn publisher(&self) -> &str {
        &self.publisher
    }

    /// Hub name the event arrived on
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Namespace of the originating hub
    pub fn source_namespace(&self) -> &str {
        &self.source_namespace
    }

    /// Construction timestamp
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_item_construction() {
        let item = WorkItem::new("device-42", "telemetry-hub", "iot-ns", vec![1, 2, 3])
            .expect("valid item");

        assert_eq!(item.routing_key(), "device-42");
        assert_eq!(item.publisher(), "device-42");
        assert_eq!(item.source_name(), "telemetry-hub");
        assert_eq!(item.source_namespace(), "iot-ns");
        assert_eq!(item.payload(), &[1, 2, 3]);
        assert!(item.created_at() <= Utc::now());
    }

    #[test]
    fn test_empty_publisher_rejected() {
        let err = WorkItem::new("", "hub", "ns", vec![1]).unwrap_err();
        assert!(matches!(err, DispatchError::Validation { .. }));
    }

    #[test]
    fn test_whitespace_publisher_rejected() {
        let err = WorkItem::new("   ", "hub", "ns", vec![1]).unwrap_err();
        assert!(matches!(err, DispatchError::Validation { .. }));
    }

    #[test]
    fn test_empty_payload_rejected() {
        let err = WorkItem::new("device-1", "hub", "ns", Vec::new()).unwrap_err();
        assert!(matches!(err, DispatchError::Validation { .. }));
    }

    #[test]
    fn test_empty_provenance_rejected() {
        assert!(WorkItem::new("device-1", "", "ns", vec![1]).is_err());
        assert!(WorkItem::new("device-1", "hub", "", vec![1]).is_err());
    }

    #[test]
    fn test_clone_preserves_identity() {
        // A retried item is the same value, including its stamped uuid.
        let item = WorkItem::new("device-1", "hub", "ns", vec![9]).unwrap();
        let requeued = item.clone();
        assert_eq!(item, requeued);
        assert_eq!(item.item_uuid(), requeued.item_uuid());
    }

    #[test]
    fn test_distinct_items_have_distinct_uuids() {
        let a = WorkItem::new("device-1", "hub", "ns", vec![1]).unwrap();
        let b = WorkItem::new("device-1", "hub", "ns", vec![1]).unwrap();
        assert_ne!(a.item_uuid(), b.item_uuid());
    }
}
