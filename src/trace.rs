//! # Trace Sink
//!
//! Boundary contract toward the tracing collaborator: human-readable progress
//! and error strings, fire-and-forget. A sink implementation must never block
//! the dispatch path and must never let a tracing failure propagate into it.

use tracing::info;

/// Consumer of human-readable progress/error strings.
///
/// Implementations are injected into the dispatcher and its handlers at
/// construction time so tests can record messages deterministically.
pub trait TraceSink: Send + Sync {
    /// Emit one message. Fire-and-forget: implementations swallow their own
    /// failures rather than surfacing them to the caller.
    fn trace_message(&self, message: &str);
}

/// Default sink forwarding messages to the `tracing` infrastructure.
#[derive(Debug, Clone, Default)]
pub struct TracingTraceSink;

impl TracingTraceSink {
    /// Create a new tracing-backed sink
    pub fn new() -> Self {
        Self
    }
}

impl TraceSink for TracingTraceSink {
    fn trace_message(&self, message: &str) {
        info!(target: "gateway_trace", "{message}");
    }
}

/// Sink that discards all messages
#[derive(Debug, Clone, Default)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn trace_message(&self, _message: &str) {}
}
