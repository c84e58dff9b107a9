//! # Actor Proxy Cache
//!
//! Lazily-initialized, per-handler cache of resolved destination actor
//! references, keyed by routing key.
//!
//! ## Architecture
//!
//! Resolution is delegated to an injected [`ActorResolver`] rather than a
//! global/static proxy constructor, so tests can supply a fake resolver and
//! the actor runtime stays an external collaborator behind a trait seam.
//!
//! ## Concurrency
//!
//! The check-then-create path is guarded by an async mutex held across the
//! resolution await, which guarantees **at-most-one concurrent resolution**
//! per cache: the first caller wins, late callers wait and receive the same
//! freshly created reference. A plain nullable-field check would race under
//! concurrent workers.
//!
//! Entries are never invalidated. Routing keys are assumed to map to
//! long-lived actors; a reconnect/eviction policy is a known gap, and
//! [`ActorProxyCache::len`] is exposed so cardinality can be watched.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::dispatch::errors::DispatchResult;

/// Location-transparent handle to an addressable remote destination.
///
/// Exposes the handler-specific remote operations of the per-device actor.
#[async_trait]
pub trait ActorProxy: Send + Sync {
    /// Post one event body to the destination actor.
    async fn post(
        &self,
        device_id: &str,
        hub_name: &str,
        namespace_name: &str,
        body: &[u8],
    ) -> DispatchResult<()>;
}

/// Actor resolution contract consumed from the actor runtime collaborator.
///
/// Given a stable identity key and a logical service address, returns a
/// callable reference. Network dispatch and resolve-time retries belong to
/// the runtime, not to this crate.
#[async_trait]
pub trait ActorResolver: Send + Sync {
    /// Resolve an identity to a callable actor reference.
    async fn resolve(&self, identity: &str, service_uri: &str)
        -> DispatchResult<Arc<dyn ActorProxy>>;
}

/// Per-handler cache mapping routing keys to owned actor references.
pub struct ActorProxyCache {
    resolver: Arc<dyn ActorResolver>,
    service_uri: String,
    entries: Mutex<HashMap<String, Arc<dyn ActorProxy>>>,
}

impl ActorProxyCache {
    /// Create an empty cache backed by the given resolver and service address
    pub fn new(resolver: Arc<dyn ActorResolver>, service_uri: impl Into<String>) -> Self {
        Self {
            resolver,
            service_uri: service_uri.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached reference for a routing key, resolving once on first use.
    pub async fn resolve(&self, routing_key: &str) -> DispatchResult<Arc<dyn ActorProxy>> {
        // The lock must span the resolver await to serialize first-time
        // resolution for a key.
        let mut entries = self.entries.lock().await;

        if let Some(proxy) = entries.get(routing_key) {
            return Ok(Arc::clone(proxy));
        }

        debug!(
            routing_key = %routing_key,
            service_uri = %self.service_uri,
            "Resolving actor reference on first use"
        );

        let proxy = self
            .resolver
            .resolve(routing_key, &self.service_uri)
            .await?;
        entries.insert(routing_key.to_string(), Arc::clone(&proxy));

        Ok(proxy)
    }

    /// Number of cached references. Grows without bound for high-cardinality
    /// routing keys since no eviction exists.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the cache holds no references yet
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
