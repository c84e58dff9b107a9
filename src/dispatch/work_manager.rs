//! # Work Manager
//!
//! The dispatcher at the center of the pipeline: a bounded queue of pending
//! work items, a fixed pool of concurrent workers pulling from it, and the
//! requeue loop that reinjects items a handler asks to retry.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │ Ingress Adapter │───▶│ Pending Queue    │───▶│ Worker Pool     │
//! │ (producers)     │    │ (bounded)        │    │ (N tokio tasks) │
//! └─────────────────┘    └──────────────────┘    └────────┬────────┘
//!                                 ▲                       │
//!                                 └── retry after backoff ┘
//! ```
//!
//! ## Capacity and Backpressure
//!
//! `enqueue` is fire-and-forget acceptance with a fail-fast capacity policy:
//! when `queue_capacity` items are pending the next enqueue returns
//! [`DispatchError::QueueFull`] instead of blocking, so stream-source
//! callbacks never stall on worker availability. Capacity is tracked with a
//! semaphore whose permits travel inside the queue envelopes and are released
//! as items move from pending to in-flight.
//!
//! ## Retry Model
//!
//! A `Retry` outcome re-enqueues the *same* item after an exponential backoff
//! delay, up to `RetryConfig::max_attempts` total handler invocations; the
//! ceiling drops the item with an error report instead of hot-looping forever.
//! Requeues run on detached tasks and bypass the capacity bound, so a full
//! pending queue cannot deadlock the workers that feed it.
//!
//! ## Ordering
//!
//! No ordering is guaranteed across items with different routing keys. Items
//! with the same routing key are **not** guaranteed to be processed in
//! submission order once retries interleave with fresh arrivals; this is a
//! documented weak point of the design, not a strength.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex as StatsMutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{watch, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dispatch::errors::{DispatchError, DispatchResult};
use crate::dispatch::handler::{HandlerOutcome, WorkItemHandler};
use crate::dispatch::work_item::WorkItem;
use crate::trace::TraceSink;

/// Configuration for the dispatcher
#[derive(Debug, Clone)]
pub struct WorkManagerConfig {
    /// Maximum number of pending items before enqueue fails fast
    pub queue_capacity: usize,
    /// Number of concurrent workers pulling from the queue
    pub worker_count: usize,
    /// Retry configuration for requeued items
    pub retry: RetryConfig,
}

impl Default for WorkManagerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            worker_count: 4,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for requeued work items
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum total handler invocations per item (first attempt included)
    pub max_attempts: u32,
    /// Base delay before the first requeue
    pub base_delay: Duration,
    /// Maximum delay between requeues
    pub max_delay: Duration,
    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,
    /// Add jitter to requeue delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Calculate the backoff delay before the given retry (1-based).
    pub fn delay_for_retry(&self, retry_number: u32) -> Duration {
        let exponent = retry_number.saturating_sub(1);
        let delay = self
            .base_delay
            .mul_f64(self.backoff_multiplier.powi(exponent as i32));
        let delay = delay.min(self.max_delay);

        if self.jitter {
            let jitter = fastrand::f64() * 0.1; // 10% jitter
            delay.mul_f64(1.0 + jitter).min(self.max_delay)
        } else {
            delay
        }
    }
}

/// Snapshot of dispatcher counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Items accepted by `enqueue`
    pub enqueued: u64,
    /// Items that reached a final `Done` outcome
    pub completed: u64,
    /// Requeues scheduled after `Retry` outcomes
    pub retried: u64,
    /// Items dropped: retry ceiling reached or handler fault
    pub dropped: u64,
    /// Enqueues rejected at capacity
    pub rejected: u64,
    /// Pending items discarded at shutdown
    pub discarded: u64,
    /// Items currently being processed by workers
    pub in_flight: usize,
    /// Configured queue capacity
    pub queue_capacity: usize,
    /// Configured worker count
    pub worker_count: usize,
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: u64,
    completed: u64,
    retried: u64,
    dropped: u64,
    rejected: u64,
    discarded: u64,
}

/// Internal queue envelope. The item inside is never mutated; the attempt
/// count and the capacity permit are dispatcher metadata.
struct DispatchEnvelope {
    item: WorkItem,
    attempt: u32,
    capacity_permit: Option<OwnedSemaphorePermit>,
}

#[derive(Debug, Clone)]
struct InFlightRecord {
    routing_key: String,
    attempt: u32,
    started_at: DateTime<Utc>,
}

/// Queue + worker pool coordinating handler invocation and retry requeueing.
///
/// Owns the pending queue, the worker pool, the handler instance, and the
/// dispatch statistics. Item lifecycle per attempt:
/// `Pending → InFlight → { Completed | RequeuedPending | Dropped }`.
pub struct WorkManager {
    handler: Arc<dyn WorkItemHandler>,
    trace_sink: Arc<dyn TraceSink>,
    config: WorkManagerConfig,
    queue_tx: UnboundedSender<DispatchEnvelope>,
    queue_rx: Arc<Mutex<UnboundedReceiver<DispatchEnvelope>>>,
    capacity: Arc<Semaphore>,
    shutdown_tx: watch::Sender<bool>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    accepting: Arc<AtomicBool>,
    started: Arc<AtomicBool>,
    counters: Arc<StatsMutex<Counters>>,
    in_flight: Arc<DashMap<Uuid, InFlightRecord>>,
}

impl WorkManager {
    /// Create a dispatcher around the given handler.
    ///
    /// Fails when the queue cannot be constructed with the requested bounds;
    /// that condition is fatal for the pipeline, not retryable.
    pub fn new(
        handler: Arc<dyn WorkItemHandler>,
        trace_sink: Arc<dyn TraceSink>,
        config: WorkManagerConfig,
    ) -> DispatchResult<Self> {
        if config.queue_capacity == 0 {
            return Err(DispatchError::worker_pool(
                "queue_capacity must be positive",
            ));
        }
        if config.worker_count == 0 {
            return Err(DispatchError::worker_pool("worker_count must be positive"));
        }

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            handler,
            trace_sink,
            capacity: Arc::new(Semaphore::new(config.queue_capacity)),
            config,
            queue_tx,
            queue_rx: Arc::new(Mutex::new(queue_rx)),
            shutdown_tx,
            workers: Arc::new(Mutex::new(Vec::new())),
            accepting: Arc::new(AtomicBool::new(true)),
            started: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(StatsMutex::new(Counters::default())),
            in_flight: Arc::new(DashMap::new()),
        })
    }

    /// Append a work item to the pending queue.
    ///
    /// Returns immediately: fire-and-forget acceptance, or
    /// [`DispatchError::QueueFull`] when the capacity bound is reached
    /// (fail-fast policy, see module docs), or [`DispatchError::Shutdown`]
    /// after `stop`.
    pub fn enqueue(&self, item: WorkItem) -> DispatchResult<()> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(DispatchError::Shutdown);
        }

        let permit = match Arc::clone(&self.capacity).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.counters.lock().rejected += 1;
                return Err(DispatchError::queue_full(self.config.queue_capacity));
            }
        };

        let envelope = DispatchEnvelope {
            attempt: 1,
            capacity_permit: Some(permit),
            item,
        };

        self.queue_tx
            .send(envelope)
            .map_err(|_| DispatchError::Shutdown)?;
        self.counters.lock().enqueued += 1;
        Ok(())
    }

    /// Launch the worker pool.
    ///
    /// Starting an already-started dispatcher is an error; failure here is
    /// fatal for the pipeline.
    pub async fn start(&self) -> DispatchResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(DispatchError::worker_pool("worker pool already started"));
        }

        let mut workers = self.workers.lock().await;
        for worker_id in 0..self.config.worker_count {
            let manager = self.clone();
            let shutdown_rx = self.shutdown_tx.subscribe();
            workers.push(tokio::spawn(async move {
                manager.worker_loop(worker_id, shutdown_rx).await;
            }));
        }

        info!(
            worker_count = self.config.worker_count,
            queue_capacity = self.config.queue_capacity,
            handler = self.handler.handler_name(),
            "🚚 WORK_MANAGER: Worker pool started"
        );
        self.trace_sink.trace_message(&format!(
            "WorkManager: started {} workers (queue capacity {})",
            self.config.worker_count, self.config.queue_capacity
        ));

        Ok(())
    }

    /// Signal workers to finish their current item and exit, then join them.
    ///
    /// Cooperative cancellation: a worker is never interrupted mid-handler
    /// call. The queue is not drained; pending items are discarded and
    /// counted in [`DispatchStats::discarded`]; the pipeline only promises
    /// at-least-once delivery while the process is alive.
    pub async fn stop(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(true);

        let handles: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        let mut queue_rx = self.queue_rx.lock().await;
        queue_rx.close();
        let mut discarded = 0u64;
        while queue_rx.try_recv().is_ok() {
            discarded += 1;
        }
        drop(queue_rx);

        if discarded > 0 {
            self.counters.lock().discarded += discarded;
            warn!(
                discarded = discarded,
                "Discarded pending work items at shutdown"
            );
            self.trace_sink.trace_message(&format!(
                "WorkManager: discarded {discarded} pending items at shutdown"
            ));
        }

        info!("🚚 WORK_MANAGER: Stopped");
    }

    /// Snapshot of dispatch counters
    pub fn stats(&self) -> DispatchStats {
        let counters = self.counters.lock();
        DispatchStats {
            enqueued: counters.enqueued,
            completed: counters.completed,
            retried: counters.retried,
            dropped: counters.dropped,
            rejected: counters.rejected,
            discarded: counters.discarded,
            in_flight: self.in_flight.len(),
            queue_capacity: self.config.queue_capacity,
            worker_count: self.config.worker_count,
        }
    }

    /// Number of externally enqueued items still waiting in the queue.
    /// Requeued retries bypass the capacity bound and are not counted here.
    pub fn queue_depth(&self) -> usize {
        self.config.queue_capacity - self.capacity.available_permits()
    }

    /// Number of items currently being processed
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Routing key, attempt number, and start time of every in-flight item,
    /// for diagnostics and stuck-handler investigation.
    pub fn in_flight_details(&self) -> Vec<(String, u32, DateTime<Utc>)> {
        self.in_flight
            .iter()
            .map(|entry| {
                (
                    entry.routing_key.clone(),
                    entry.attempt,
                    entry.started_at,
                )
            })
            .collect()
    }

    async fn worker_loop(&self, worker_id: usize, mut shutdown_rx: watch::Receiver<bool>) {
        debug!(worker_id = worker_id, "Dispatch worker started");

        loop {
            let envelope = {
                let mut queue_rx = self.queue_rx.lock().await;
                tokio::select! {
                    _ = shutdown_rx.changed() => None,
                    envelope = queue_rx.recv() => envelope,
                }
            };

            let Some(envelope) = envelope else { break };
            self.process_envelope(envelope, worker_id).await;

            if *shutdown_rx.borrow() {
                break;
            }
        }

        debug!(worker_id = worker_id, "Dispatch worker exited");
    }

    async fn process_envelope(&self, envelope: DispatchEnvelope, worker_id: usize) {
        let DispatchEnvelope {
            item,
            attempt,
            capacity_permit,
        } = envelope;

        // The item leaves the pending queue here; its capacity slot frees up
        // for producers while it is in flight.
        drop(capacity_permit);

        let item_uuid = item.item_uuid();
        let routing_key = item.routing_key().to_string();
        self.in_flight.insert(
            item_uuid,
            InFlightRecord {
                routing_key: routing_key.clone(),
                attempt,
                started_at: Utc::now(),
            },
        );

        let started = Instant::now();
        let result = AssertUnwindSafe(self.handler.process(item)).catch_unwind().await;
        let duration = started.elapsed();

        self.in_flight.remove(&item_uuid);

        match result {
            Ok(HandlerOutcome::Done) => {
                self.counters.lock().completed += 1;
                debug!(
                    worker_id = worker_id,
                    item_uuid = %item_uuid,
                    routing_key = %routing_key,
                    attempt = attempt,
                    duration_ms = duration.as_millis() as u64,
                    "Work item completed"
                );
            }
            Ok(HandlerOutcome::Retry(item)) => {
                self.schedule_retry(item, attempt);
            }
            Err(panic) => {
                // One bad item must not stop the pool: an unexpected handler
                // fault is reported as a permanent failure and the worker
                // continues its loop.
                let message = panic_message(panic.as_ref());
                let fault = DispatchError::permanent_handler(&routing_key, &message);
                error!(
                    worker_id = worker_id,
                    item_uuid = %item_uuid,
                    routing_key = %routing_key,
                    attempt = attempt,
                    error = %fault,
                    "Handler fault caught, dropping item"
                );
                self.trace_sink
                    .trace_message(&format!("WorkManager: {fault}"));
                self.counters.lock().dropped += 1;
            }
        }
    }

    fn schedule_retry(&self, item: WorkItem, finished_attempt: u32) {
        let next_attempt = finished_attempt + 1;
        let routing_key = item.routing_key().to_string();
        let item_uuid = item.item_uuid();

        if next_attempt > self.config.retry.max_attempts {
            self.counters.lock().dropped += 1;
            let fault = DispatchError::permanent_handler(
                &routing_key,
                format!("retry ceiling reached after {finished_attempt} attempts"),
            );
            warn!(
                item_uuid = %item_uuid,
                routing_key = %routing_key,
                attempts = finished_attempt,
                "Retry ceiling reached, dropping work item"
            );
            self.trace_sink
                .trace_message(&format!("WorkManager: {fault}"));
            return;
        }

        let delay = self.config.retry.delay_for_retry(finished_attempt);
        self.counters.lock().retried += 1;
        debug!(
            item_uuid = %item_uuid,
            routing_key = %routing_key,
            next_attempt = next_attempt,
            delay_ms = delay.as_millis() as u64,
            "Requeueing work item after backoff"
        );

        // Detached so the worker never blocks on its own requeue. The retry
        // lane bypasses the capacity bound: a full pending queue must not be
        // able to deadlock the workers that drain it.
        let queue_tx = self.queue_tx.clone();
        let counters = Arc::clone(&self.counters);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let envelope = DispatchEnvelope {
                item,
                attempt: next_attempt,
                capacity_permit: None,
            };
            if queue_tx.send(envelope).is_err() {
                // Dispatcher shut down while the retry was sleeping.
                counters.lock().discarded += 1;
            }
        });
    }
}

impl Clone for WorkManager {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            trace_sink: Arc::clone(&self.trace_sink),
            config: self.config.clone(),
            queue_tx: self.queue_tx.clone(),
            queue_rx: Arc::clone(&self.queue_rx),
            capacity: Arc::clone(&self.capacity),
            shutdown_tx: self.shutdown_tx.clone(),
            workers: Arc::clone(&self.workers),
            accepting: Arc::clone(&self.accepting),
            started: Arc::clone(&self.started),
            counters: Arc::clone(&self.counters),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use proptest::prelude::*;

    struct AlwaysDone;

    #[async_trait]
    impl WorkItemHandler for AlwaysDone {
        async fn process(&self, _item: WorkItem) -> HandlerOutcome {
            HandlerOutcome::Done
        }

        fn handler_name(&self) -> &'static str {
            "AlwaysDone"
        }
    }

    fn manager(config: WorkManagerConfig) -> WorkManager {
        WorkManager::new(
            Arc::new(AlwaysDone),
            Arc::new(crate::trace::NullTraceSink),
            config,
        )
        .unwrap()
    }

    fn item(key: &str) -> WorkItem {
        WorkItem::new(key, "hub", "ns", vec![0xAB]).unwrap()
    }

    #[test]
    fn test_delay_growth_without_jitter() {
        let retry = RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: false,
        };

        assert_eq!(retry.delay_for_retry(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for_retry(2), Duration::from_millis(200));
        assert_eq!(retry.delay_for_retry(3), Duration::from_millis(400));
        // Capped at max_delay.
        assert_eq!(retry.delay_for_retry(10), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_capacity_is_fatal() {
        let result = WorkManager::new(
            Arc::new(AlwaysDone),
            Arc::new(crate::trace::NullTraceSink),
            WorkManagerConfig {
                queue_capacity: 0,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(DispatchError::WorkerPool { .. })));
    }

    #[test]
    fn test_zero_workers_is_fatal() {
        let result = WorkManager::new(
            Arc::new(AlwaysDone),
            Arc::new(crate::trace::NullTraceSink),
            WorkManagerConfig {
                worker_count: 0,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(DispatchError::WorkerPool { .. })));
    }

    #[tokio::test]
    async fn test_enqueue_increases_queue_depth() {
        let manager = manager(WorkManagerConfig {
            queue_capacity: 8,
            ..Default::default()
        });

        assert_eq!(manager.queue_depth(), 0);
        manager.enqueue(item("device-1")).unwrap();
        assert_eq!(manager.queue_depth(), 1);
        assert_eq!(manager.stats().enqueued, 1);
    }

    #[tokio::test]
    async fn test_stats_snapshot_round_trips_through_json() {
        let manager = manager(WorkManagerConfig {
            queue_capacity: 8,
            worker_count: 2,
            ..Default::default()
        });
        manager.enqueue(item("device-1")).unwrap();

        let json = serde_json::to_value(manager.stats()).unwrap();
        assert_eq!(json["enqueued"], 1);
        assert_eq!(json["queue_capacity"], 8);
        assert_eq!(json["worker_count"], 2);

        let stats: DispatchStats = serde_json::from_value(json).unwrap();
        assert_eq!(stats.enqueued, 1);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn test_enqueue_fails_fast_at_capacity() {
        let manager = manager(WorkManagerConfig {
            queue_capacity: 2,
            ..Default::default()
        });

        manager.enqueue(item("device-1")).unwrap();
        manager.enqueue(item("device-2")).unwrap();

        let err = manager.enqueue(item("device-3")).unwrap_err();
        assert!(matches!(err, DispatchError::QueueFull { capacity: 2 }));
        assert_eq!(manager.stats().rejected, 1);
    }

    #[tokio::test]
    async fn test_enqueue_after_stop_is_rejected() {
        let manager = manager(WorkManagerConfig::default());
        manager.start().await.unwrap();
        manager.stop().await;

        let err = manager.enqueue(item("device-1")).unwrap_err();
        assert!(matches!(err, DispatchError::Shutdown));
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let manager = manager(WorkManagerConfig::default());
        manager.start().await.unwrap();
        assert!(matches!(
            manager.start().await,
            Err(DispatchError::WorkerPool { .. })
        ));
        manager.stop().await;
    }

    proptest! {
        #[test]
        fn prop_jittered_delay_stays_within_bounds(retry_number in 1u32..16) {
            let retry = RetryConfig {
                max_attempts: 16,
                base_delay: Duration::from_millis(50),
                max_delay: Duration::from_secs(10),
                backoff_multiplier: 2.0,
                jitter: true,
            };

            let unjittered = Duration::from_millis(50)
                .mul_f64(2.0f64.powi(retry_number as i32 - 1))
                .min(Duration::from_secs(10));
            let delay = retry.delay_for_retry(retry_number);

            // Jitter only ever lengthens the delay, by at most 10%, and the
            // cap holds after jitter is applied.
            prop_assert!(delay >= unjittered.min(Duration::from_secs(10)));
            prop_assert!(delay <= unjittered.mul_f64(1.1).min(Duration::from_secs(10)));
        }
    }
}
