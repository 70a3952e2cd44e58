//! Debounced catch-up queue implementation.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::library::{Item, ItemId, LibraryEvent, LibraryStore};
use crate::metrics;
use crate::probe::{BatchError, DiscardProgress, ProbeOrchestrator, ProbeSettings};

/// Quiet period after the last notification before a flush.
pub const CATCH_UP_DEBOUNCE: Duration = Duration::from_secs(30);

/// Errors from catch-up lifecycle transitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatchUpError {
    #[error("Catch-up queue already running")]
    AlreadyRunning,

    /// Stopped queues cannot be restarted.
    #[error("Catch-up queue has been stopped")]
    Stopped,
}

/// Lifecycle state as reported in [`CatchUpStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchUpState {
    NotStarted,
    Running,
    Stopped,
}

/// Snapshot of the catch-up queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatchUpStatus {
    pub state: CatchUpState,
    /// Items waiting for the next flush.
    pub pending_items: usize,
    /// Notifications accepted into the queue.
    pub events_enqueued: u64,
    /// Notifications ignored (disabled mode, no path, not a pointer).
    pub events_ignored: u64,
    /// Flushes that handed a batch to the orchestrator.
    pub flushes: u64,
    /// Items handed to the orchestrator.
    pub items_flushed: u64,
    /// Queued items dropped at flush time because they were already probed.
    pub items_skipped: u64,
    /// Queued items dropped at flush time as duplicates or because they no
    /// longer resolve.
    pub items_dropped: u64,
    /// Flushes that ended in an error or a panic.
    pub flush_failures: u64,
}

#[derive(Default)]
struct Stats {
    pending_items: AtomicUsize,
    events_enqueued: AtomicU64,
    events_ignored: AtomicU64,
    flushes: AtomicU64,
    items_flushed: AtomicU64,
    items_skipped: AtomicU64,
    items_dropped: AtomicU64,
    flush_failures: AtomicU64,
}

enum Lifecycle {
    NotStarted,
    Running {
        token: CancellationToken,
        consumer: JoinHandle<()>,
    },
    Stopped,
}

/// Event-driven front door to the orchestrator.
///
/// One consumer task owns the pending items and the debounce deadline, so a
/// flush always sees every item enqueued before it and nothing is flushed
/// twice.
pub struct CatchUpQueue {
    store: Arc<dyn LibraryStore>,
    orchestrator: Arc<ProbeOrchestrator>,
    settings: watch::Receiver<ProbeSettings>,
    debounce: Duration,
    lifecycle: Mutex<Lifecycle>,
    stats: Arc<Stats>,
}

impl CatchUpQueue {
    pub fn new(
        store: Arc<dyn LibraryStore>,
        orchestrator: Arc<ProbeOrchestrator>,
        settings: watch::Receiver<ProbeSettings>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            settings,
            debounce: CATCH_UP_DEBOUNCE,
            lifecycle: Mutex::new(Lifecycle::NotStarted),
            stats: Arc::new(Stats::default()),
        }
    }

    /// Override the debounce delay.
    pub fn with_debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce = delay;
        self
    }

    /// Subscribe to the store and spawn the consumer task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), CatchUpError> {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        match *lifecycle {
            Lifecycle::Running { .. } => return Err(CatchUpError::AlreadyRunning),
            Lifecycle::Stopped => return Err(CatchUpError::Stopped),
            Lifecycle::NotStarted => {}
        }

        let token = CancellationToken::new();
        let consumer = Consumer {
            store: self.store.clone(),
            orchestrator: self.orchestrator.clone(),
            settings: self.settings.clone(),
            debounce: self.debounce,
            stats: self.stats.clone(),
            token: token.clone(),
            pending: Vec::new(),
            last_flush: None,
        };
        let events = self.store.subscribe();
        let consumer = tokio::spawn(consumer.run(events));

        *lifecycle = Lifecycle::Running { token, consumer };
        info!(
            "STRM probe catch-up mode initialized (debounce {}s)",
            self.debounce.as_secs_f64()
        );
        Ok(())
    }

    /// Stop the consumer, disarm the deadline and cancel in-flight flushes.
    /// Idempotent; a stopped queue stays stopped.
    pub fn stop(&self) {
        if let Some(consumer) = self.take_running() {
            consumer.abort();
        }
    }

    /// Like [`stop`](Self::stop), but waits for the consumer task to exit.
    pub async fn shutdown(&self) {
        if let Some(consumer) = self.take_running() {
            if let Err(e) = consumer.await {
                if !e.is_cancelled() {
                    error!("Catch-up consumer ended abnormally: {}", e);
                }
            }
        }
    }

    fn take_running(&self) -> Option<JoinHandle<()>> {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running { token, consumer } => {
                token.cancel();
                info!("STRM probe catch-up mode stopped");
                Some(consumer)
            }
            _ => None,
        }
    }

    pub fn state(&self) -> CatchUpState {
        match *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner) {
            Lifecycle::NotStarted => CatchUpState::NotStarted,
            Lifecycle::Running { .. } => CatchUpState::Running,
            Lifecycle::Stopped => CatchUpState::Stopped,
        }
    }

    pub fn status(&self) -> CatchUpStatus {
        let stats = &self.stats;
        CatchUpStatus {
            state: self.state(),
            pending_items: stats.pending_items.load(Ordering::Relaxed),
            events_enqueued: stats.events_enqueued.load(Ordering::Relaxed),
            events_ignored: stats.events_ignored.load(Ordering::Relaxed),
            flushes: stats.flushes.load(Ordering::Relaxed),
            items_flushed: stats.items_flushed.load(Ordering::Relaxed),
            items_skipped: stats.items_skipped.load(Ordering::Relaxed),
            items_dropped: stats.items_dropped.load(Ordering::Relaxed),
            flush_failures: stats.flush_failures.load(Ordering::Relaxed),
        }
    }
}

impl Drop for CatchUpQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the consumer task.
struct Consumer {
    store: Arc<dyn LibraryStore>,
    orchestrator: Arc<ProbeOrchestrator>,
    settings: watch::Receiver<ProbeSettings>,
    debounce: Duration,
    stats: Arc<Stats>,
    token: CancellationToken,
    pending: Vec<Item>,
    /// Flushes run one after another so they never add up past the
    /// configured parallelism.
    last_flush: Option<JoinHandle<()>>,
}

impl Consumer {
    async fn run(mut self, mut events: broadcast::Receiver<LibraryEvent>) {
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = wait_until(deadline) => {
                    deadline = None;
                    self.flush();
                }
                event = events.recv() => match event {
                    Ok(LibraryEvent::ItemAdded(item)) => {
                        if self.enqueue(item) {
                            deadline = Some(Instant::now() + self.debounce);
                        }
                    }
                    Ok(LibraryEvent::ItemRemoved(id)) => self.forget(&id),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Catch-up queue lagged, {} library notifications dropped", skipped);
                    }
                    Err(RecvError::Closed) => {
                        debug!("Library notifications closed, flushing pending items");
                        self.flush();
                        break;
                    }
                },
            }
        }

        debug!("Catch-up consumer exiting");
    }

    /// Returns true when the item was queued.
    fn enqueue(&mut self, item: Item) -> bool {
        if !self.settings.borrow().enable_catch_up_mode {
            self.stats.events_ignored.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        if !item.is_strm() {
            self.stats.events_ignored.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        debug!("Catch-up: queued {} ({})", item.name, item.id);
        self.pending.push(item);
        self.stats.events_enqueued.fetch_add(1, Ordering::Relaxed);
        self.stats
            .pending_items
            .store(self.pending.len(), Ordering::Relaxed);
        true
    }

    fn forget(&mut self, id: &ItemId) {
        self.pending.retain(|item| item.id != *id);
        self.stats
            .pending_items
            .store(self.pending.len(), Ordering::Relaxed);
    }

    /// Drain the pending items and spawn a batch for those still unprobed.
    ///
    /// The batch starts once the previous flush has finished.
    fn flush(&mut self) {
        let queued = std::mem::take(&mut self.pending);
        self.stats.pending_items.store(0, Ordering::Relaxed);
        if queued.is_empty() {
            return;
        }

        let store = self.store.clone();
        let orchestrator = self.orchestrator.clone();
        let settings = self.settings.clone();
        let stats = self.stats.clone();
        let token = self.token.child_token();
        let previous = self.last_flush.take();

        self.last_flush = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }

            // Re-resolving reads sidecar files.
            let resolve_stats = stats.clone();
            let unprobed = match tokio::task::spawn_blocking(move || {
                still_unprobed(store.as_ref(), queued, &resolve_stats)
            })
            .await
            {
                Ok(unprobed) => unprobed,
                Err(e) => {
                    error!("Catch-up flush failed to re-resolve items: {}", e);
                    stats.flush_failures.fetch_add(1, Ordering::Relaxed);
                    metrics::CATCHUP_FLUSHES.with_label_values(&["panicked"]).inc();
                    return;
                }
            };

            if unprobed.is_empty() {
                debug!("Catch-up: no queued items left to probe");
                return;
            }

            info!("Catch-up: probing {} new STRM items", unprobed.len());
            stats.flushes.fetch_add(1, Ordering::Relaxed);
            stats
                .items_flushed
                .fetch_add(unprobed.len() as u64, Ordering::Relaxed);
            metrics::CATCHUP_ITEMS.inc_by(unprobed.len() as u64);

            let config = settings.borrow().batch_config();
            let batch = orchestrator.probe_batch(unprobed, &config, &DiscardProgress, &token);
            let label = match AssertUnwindSafe(batch).catch_unwind().await {
                Ok(Ok(result)) => {
                    debug!(
                        "Catch-up flush finished: {} probed, {} failed",
                        result.probed, result.failed
                    );
                    "completed"
                }
                Ok(Err(BatchError::Cancelled)) => {
                    debug!("Catch-up flush was cancelled");
                    stats.flush_failures.fetch_add(1, Ordering::Relaxed);
                    "cancelled"
                }
                Err(_) => {
                    error!("Catch-up flush panicked");
                    stats.flush_failures.fetch_add(1, Ordering::Relaxed);
                    "panicked"
                }
            };
            metrics::CATCHUP_FLUSHES.with_label_values(&[label]).inc();
        }));
    }
}

/// Re-resolves queued items and keeps the first copy of each id that still
/// needs a probe. Blocking.
fn still_unprobed(store: &dyn LibraryStore, queued: Vec<Item>, stats: &Stats) -> Vec<Item> {
    let mut seen = HashSet::new();
    let mut unprobed = Vec::new();
    let mut skipped = 0u64;
    let mut dropped = 0u64;

    for item in queued {
        if !seen.insert(item.id) {
            dropped += 1;
            continue;
        }
        match store.resolve_item(&item.id) {
            Ok(current) if current.needs_probe() => unprobed.push(current),
            Ok(_) => skipped += 1,
            Err(e) => {
                debug!("Catch-up: dropping {}: {}", item.id, e);
                dropped += 1;
            }
        }
    }

    stats.items_skipped.fetch_add(skipped, Ordering::Relaxed);
    stats.items_dropped.fetch_add(dropped, Ordering::Relaxed);
    unprobed
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
