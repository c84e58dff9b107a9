//! # Dispatch Error Types
//!
//! Comprehensive error handling for the dispatch pipeline using thiserror
//! for structured error types instead of `Box<dyn Error>` patterns.
//!
//! The taxonomy follows the failure model of the pipeline: validation failures
//! are rejected at ingress, transient remote failures become retry outcomes,
//! permanent handler failures are reported and dropped, and capacity violations
//! are surfaced to the producer.

use thiserror::Error;

/// Comprehensive dispatch error types
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Invalid work item: {message}")]
    Validation { message: String },

    #[error("Transient remote failure: {operation}: {message}")]
    TransientRemote { operation: String, message: String },

    #[error("Permanent handler failure for routing key {routing_key}: {message}")]
    PermanentHandler {
        routing_key: String,
        message: String,
    },

    #[error("Pending queue is full: capacity {capacity} reached")]
    QueueFull { capacity: usize },

    #[error("Actor resolution failed for identity {identity}: {message}")]
    Resolution { identity: String, message: String },

    #[error("Remote call timed out: operation {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Dispatcher is shut down")]
    Shutdown,

    #[error("Worker pool error: {message}")]
    WorkerPool { message: String },
}

impl DispatchError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a transient remote error
    pub fn transient_remote(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientRemote {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a permanent handler error
    pub fn permanent_handler(
        routing_key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::PermanentHandler {
            routing_key: routing_key.into(),
            message: message.into(),
        }
    }

    /// Create a queue full error
    pub fn queue_full(capacity: usize) -> Self {
        Self::QueueFull { capacity }
    }

    /// Create an actor resolution error
    pub fn resolution(identity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            identity: identity.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a worker pool error
    pub fn worker_pool(message: impl Into<String>) -> Self {
        Self::WorkerPool {
            message: message.into(),
        }
    }

    /// Whether a retry may succeed for this error.
    ///
    /// Transient, timeout, and resolution failures are worth retrying;
    /// validation and permanent handler failures never are.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransientRemote { .. } | Self::Timeout { .. } | Self::Resolution { .. }
        )
    }
}

/// Result type alias for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;
