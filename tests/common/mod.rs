//! Shared fakes and helpers for dispatch pipeline integration tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use uuid::Uuid;

use gateway_core::dispatch::{HandlerOutcome, WorkItem, WorkItemHandler};
use gateway_core::trace::TraceSink;

/// Trace sink that records every message for later assertions.
#[derive(Default)]
pub struct RecordingTraceSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl TraceSink for RecordingTraceSink {
    fn trace_message(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

/// Handler that signals `Retry` a fixed number of times per item before
/// completing, recording every invocation.
pub struct RetryNTimesHandler {
    retries_before_done: u32,
    invocations: DashMap<Uuid, u32>,
    completions: DashMap<Uuid, u32>,
}

impl RetryNTimesHandler {
    pub fn new(retries_before_done: u32) -> Self {
        Self {
            retries_before_done,
            invocations: DashMap::new(),
            completions: DashMap::new(),
        }
    }

    pub fn invocations_for(&self, item_uuid: Uuid) -> u32 {
        self.invocations.get(&item_uuid).map(|e| *e).unwrap_or(0)
    }

    pub fn completions_for(&self, item_uuid: Uuid) -> u32 {
        self.completions.get(&item_uuid).map(|e| *e).unwrap_or(0)
    }

    pub fn total_completions(&self) -> u32 {
        self.completions.iter().map(|e| *e.value()).sum()
    }
}

#[async_trait]
impl WorkItemHandler for RetryNTimesHandler {
    async fn process(&self, item: WorkItem) -> HandlerOutcome {
        let attempt = {
            let mut entry = self.invocations.entry(item.item_uuid()).or_insert(0);
            *entry += 1;
            *entry
        };

        if attempt <= self.retries_before_done {
            HandlerOutcome::Retry(item)
        } else {
            *self.completions.entry(item.item_uuid()).or_insert(0) += 1;
            HandlerOutcome::Done
        }
    }

    fn handler_name(&self) -> &'static str {
        "RetryNTimesHandler"
    }
}

/// Handler that never succeeds.
#[derive(Default)]
pub struct AlwaysRetryHandler {
    pub invocations: AtomicU32,
}

#[async_trait]
impl WorkItemHandler for AlwaysRetryHandler {
    async fn process(&self, item: WorkItem) -> HandlerOutcome {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        HandlerOutcome::Retry(item)
    }

    fn handler_name(&self) -> &'static str {
        "AlwaysRetryHandler"
    }
}

/// Handler that parks on a semaphore until the test releases it, so tests can
/// hold items in flight deliberately.
pub struct GatedHandler {
    pub gate: Arc<Semaphore>,
    pub completions: AtomicU32,
}

impl GatedHandler {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            completions: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl WorkItemHandler for GatedHandler {
    async fn process(&self, _item: WorkItem) -> HandlerOutcome {
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();
        self.completions.fetch_add(1, Ordering::SeqCst);
        HandlerOutcome::Done
    }

    fn handler_name(&self) -> &'static str {
        "GatedHandler"
    }
}

/// Handler that panics on a poisoned routing key and succeeds otherwise.
pub struct PoisonAwareHandler {
    poison_key: String,
    pub completions: AtomicU32,
}

impl PoisonAwareHandler {
    pub fn new(poison_key: impl Into<String>) -> Self {
        Self {
            poison_key: poison_key.into(),
            completions: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl WorkItemHandler for PoisonAwareHandler {
    async fn process(&self, item: WorkItem) -> HandlerOutcome {
        if item.routing_key() == self.poison_key {
            panic!("poisoned work item");
        }
        self.completions.fetch_add(1, Ordering::SeqCst);
        HandlerOutcome::Done
    }

    fn handler_name(&self) -> &'static str {
        "PoisonAwareHandler"
    }
}

/// Handler recording delivered payloads in arrival order.
#[derive(Default)]
pub struct RecordingHandler {
    pub delivered: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl WorkItemHandler for RecordingHandler {
    async fn process(&self, item: WorkItem) -> HandlerOutcome {
        self.delivered.lock().push(item.payload().to_vec());
        HandlerOutcome::Done
    }

    fn handler_name(&self) -> &'static str {
        "RecordingHandler"
    }
}

/// Poll a predicate until it holds or the deadline passes.
pub async fn wait_until<F>(predicate: F, deadline: Duration) -> bool
where
    F: Fn() -> bool,
{
    let started = std::time::Instant::now();
    while started.elapsed() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}

/// Retry configuration tuned for fast tests: small delays, no jitter.
pub fn fast_retry(max_attempts: u32) -> gateway_core::dispatch::RetryConfig {
    gateway_core::dispatch::RetryConfig {
        max_attempts,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}
