//! # Command Batcher
//!
//! Size/time windowed batching with serial dispatch and bounded retry.
//!
//! Callers append command items at arbitrary frequency; the batcher groups
//! them into batches of at most `batch_max_items`, flushing early when the
//! oldest ungrouped item has waited `batch_window`. Batches are dispatched
//! to the transport strictly one at a time in FIFO order. A failed send is
//! retried up to `retry_limit` times with exponential backoff; an exhausted
//! batch is reported failed with its full id list and never silently
//! requeued — the caller decides whether to resurface it.

use super::transport::Transport;
use crate::config::StatekitConfig;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A single outgoing command request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandItem {
    pub id: String,
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
}

impl CommandItem {
    pub fn new(id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            payload,
            enqueued_at: Utc::now(),
        }
    }
}

/// Ordered group of command items dispatched in one transport call
#[derive(Debug, Clone)]
pub struct Batch {
    pub items: Vec<CommandItem>,
}

impl Batch {
    pub fn item_ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Terminal outcome of one batch, published so callers can reconcile
/// optimistic local state.
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    Succeeded {
        item_ids: Vec<String>,
    },
    Failed {
        item_ids: Vec<String>,
        error: String,
        attempts: u32,
    },
}

struct QueueState {
    pending: VecDeque<(CommandItem, tokio::time::Instant)>,
    seen: HashSet<String>,
}

/// Batching dispatcher with a dedicated worker task.
pub struct CommandBatcher {
    queue: Arc<Mutex<QueueState>>,
    wakeup: Arc<Notify>,
    outcomes: broadcast::Sender<BatchOutcome>,
    running: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

impl CommandBatcher {
    /// Spawn the dispatch worker. Must be called from within a Tokio
    /// runtime.
    pub fn start(transport: Arc<dyn Transport>, config: &StatekitConfig) -> Self {
        let queue = Arc::new(Mutex::new(QueueState {
            pending: VecDeque::new(),
            seen: HashSet::new(),
        }));
        let wakeup = Arc::new(Notify::new());
        let (outcomes, _) = broadcast::channel(config.channel_capacity);
        let running = Arc::new(AtomicBool::new(true));

        let worker = tokio::spawn(run(
            queue.clone(),
            wakeup.clone(),
            transport,
            outcomes.clone(),
            running.clone(),
            config.batch_max_items,
            config.batch_window(),
            config.retry_limit,
            config.backoff_base(),
            config.backoff_max(),
        ));

        Self {
            queue,
            wakeup,
            outcomes,
            running,
            worker,
        }
    }

    /// Append an item to the queue. Non-blocking. Returns `false` when the
    /// item was dropped: either the batcher is shut down or the id was
    /// already enqueued during this batcher's lifetime (dedupe).
    pub fn enqueue(&self, item: CommandItem) -> bool {
        if !self.running.load(Ordering::Acquire) {
            return false;
        }
        {
            let mut queue = self.queue.lock();
            if !queue.seen.insert(item.id.clone()) {
                debug!(item_id = %item.id, "Duplicate command item dropped");
                return false;
            }
            queue.pending.push_back((item, tokio::time::Instant::now()));
        }
        self.wakeup.notify_one();
        true
    }

    /// Number of items not yet grouped into a batch
    pub fn pending_len(&self) -> usize {
        self.queue.lock().pending.len()
    }

    /// Receive terminal batch outcomes
    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<BatchOutcome> {
        self.outcomes.subscribe()
    }

    /// Stop accepting items and wind the worker down. An in-flight batch is
    /// not cancelled mid-dispatch.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        self.wakeup.notify_one();
    }
}

impl Drop for CommandBatcher {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.worker.abort();
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    queue: Arc<Mutex<QueueState>>,
    wakeup: Arc<Notify>,
    transport: Arc<dyn Transport>,
    outcomes: broadcast::Sender<BatchOutcome>,
    running: Arc<AtomicBool>,
    max_items: usize,
    window: Duration,
    retry_limit: u32,
    backoff_base: Duration,
    backoff_max: Duration,
) {
    while running.load(Ordering::Acquire) {
        let oldest_at = queue.lock().pending.front().map(|(_, at)| *at);
        let Some(oldest_at) = oldest_at else {
            wakeup.notified().await;
            continue;
        };

        // Wait until the batch fills or the oldest item's window expires
        let deadline = oldest_at + window;
        loop {
            if !running.load(Ordering::Acquire) {
                return;
            }
            if queue.lock().pending.len() >= max_items {
                break;
            }
            tokio::select! {
                () = wakeup.notified() => {}
                () = tokio::time::sleep_until(deadline) => break,
            }
        }

        let batch = {
            let mut queue = queue.lock();
            let take = queue.pending.len().min(max_items);
            Batch {
                items: queue.pending.drain(..take).map(|(item, _)| item).collect(),
            }
        };
        if batch.is_empty() {
            continue;
        }

        dispatch_with_retry(
            transport.as_ref(),
            &outcomes,
            &batch,
            retry_limit,
            backoff_base,
            backoff_max,
        )
        .await;
    }
}

/// Send one batch, retrying on transport failure with exponential backoff.
/// Always publishes exactly one terminal outcome for the batch.
async fn dispatch_with_retry(
    transport: &dyn Transport,
    outcomes: &broadcast::Sender<BatchOutcome>,
    batch: &Batch,
    retry_limit: u32,
    backoff_base: Duration,
    backoff_max: Duration,
) {
    let item_ids = batch.item_ids();
    let mut attempt: u32 = 0;

    loop {
        match transport.send(batch).await {
            Ok(()) => {
                debug!(
                    items = item_ids.len(),
                    attempts = attempt + 1,
                    "Batch dispatched"
                );
                let _ = outcomes.send(BatchOutcome::Succeeded { item_ids });
                return;
            }
            Err(error) => {
                if attempt >= retry_limit {
                    warn!(
                        items = item_ids.len(),
                        attempts = attempt + 1,
                        error = %error,
                        "Batch failed; retries exhausted"
                    );
                    let _ = outcomes.send(BatchOutcome::Failed {
                        item_ids,
                        error: error.to_string(),
                        attempts: attempt + 1,
                    });
                    return;
                }

                let delay = backoff_delay(backoff_base, backoff_max, attempt);
                warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Batch send failed; backing off before retry"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

fn backoff_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt)).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::transport::TransportError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicU32;

    struct RecordingTransport {
        batches: Mutex<Vec<Vec<String>>>,
        failures_remaining: AtomicU32,
    }

    impl RecordingTransport {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(Vec::new()),
                failures_remaining: AtomicU32::new(failures),
            })
        }

        fn recorded(&self) -> Vec<Vec<String>> {
            self.batches.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, batch: &Batch) -> Result<(), TransportError> {
            let remaining = self.failures_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
                return Err(TransportError::new("simulated outage"));
            }
            self.batches.lock().push(batch.item_ids());
            Ok(())
        }
    }

    fn item(id: usize) -> CommandItem {
        CommandItem::new(format!("item-{id}"), json!({ "seq": id }))
    }

    fn config(max_items: usize) -> StatekitConfig {
        StatekitConfig {
            batch_max_items: max_items,
            ..StatekitConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_batch_flushes_immediately_rest_waits() {
        let transport = RecordingTransport::new(0);
        let batcher = CommandBatcher::start(transport.clone(), &config(25));

        for i in 0..30 {
            assert!(batcher.enqueue(item(i)));
        }
        tokio::time::sleep(Duration::from_millis(1)).await;

        // One full batch went out immediately; the remainder waits
        assert_eq!(transport.recorded().len(), 1);
        assert_eq!(transport.recorded()[0].len(), 25);
        assert_eq!(batcher.pending_len(), 5);

        // The window flushes the partial batch
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(transport.recorded().len(), 2);
        assert_eq!(transport.recorded()[1].len(), 5);
        assert_eq!(batcher.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_preserve_fifo_order() {
        let transport = RecordingTransport::new(0);
        let batcher = CommandBatcher::start(transport.clone(), &config(2));

        for i in 0..6 {
            batcher.enqueue(item(i));
        }
        tokio::time::sleep(Duration::from_millis(1)).await;

        let flat: Vec<String> = transport.recorded().into_iter().flatten().collect();
        let expected: Vec<String> = (0..6).map(|i| format!("item-{i}")).collect();
        assert_eq!(flat, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_ids_dropped_silently() {
        let transport = RecordingTransport::new(0);
        let batcher = CommandBatcher::start(transport.clone(), &config(25));

        assert!(batcher.enqueue(item(1)));
        assert!(!batcher.enqueue(item(1)));
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(transport.recorded(), vec![vec!["item-1".to_string()]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_failures_then_success_backs_off_twice() {
        let transport = RecordingTransport::new(2);
        let batcher = CommandBatcher::start(transport.clone(), &config(1));
        let mut outcomes = batcher.subscribe_outcomes();

        let started = tokio::time::Instant::now();
        batcher.enqueue(item(1));

        let outcome = outcomes.recv().await.unwrap();
        let elapsed = started.elapsed();

        assert!(matches!(outcome, BatchOutcome::Succeeded { ref item_ids } if item_ids == &["item-1"]));
        // Two backoff delays: 500ms then 1000ms
        assert!(
            elapsed >= Duration::from_millis(1490) && elapsed <= Duration::from_millis(1700),
            "unexpected backoff timing: {elapsed:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_report_failure_without_requeue() {
        let transport = RecordingTransport::new(u32::MAX);
        let batcher = CommandBatcher::start(transport.clone(), &config(1));
        let mut outcomes = batcher.subscribe_outcomes();

        batcher.enqueue(item(1));
        let outcome = outcomes.recv().await.unwrap();

        match outcome {
            BatchOutcome::Failed {
                item_ids,
                error,
                attempts,
            } => {
                assert_eq!(item_ids, vec!["item-1".to_string()]);
                assert_eq!(attempts, 4); // initial attempt + 3 retries
                assert!(error.contains("simulated outage"));
            }
            BatchOutcome::Succeeded { .. } => panic!("batch should have failed"),
        }

        // Failed items are not silently requeued
        assert_eq!(batcher.pending_len(), 0);
        assert!(transport.recorded().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_after_shutdown_is_rejected() {
        let transport = RecordingTransport::new(0);
        let batcher = CommandBatcher::start(transport.clone(), &config(25));

        batcher.shutdown();
        assert!(!batcher.enqueue(item(1)));
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let base = Duration::from_millis(500);
        let max = Duration::from_secs(60);
        assert_eq!(backoff_delay(base, max, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, max, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, max, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(base, max, 10), max);
        assert_eq!(backoff_delay(base, max, 30), max);
    }
}
