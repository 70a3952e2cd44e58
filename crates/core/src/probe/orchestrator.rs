//! Bounded-concurrency batch probing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::config::BatchConfig;
use super::error::BatchError;
use super::prober::ItemProber;
use super::traits::{ProbeProvider, ProgressSink};
use super::types::{ProbeOutcome, ProbeResult};
use crate::library::Item;
use crate::metrics;

/// Counters shared by the workers of one batch.
#[derive(Default)]
struct Tally {
    processed: usize,
    probed: usize,
    failed: usize,
    failed_items: Vec<Item>,
}

/// Runs the item prober over a collection of items.
///
/// Workers pull items from a shared cursor, so concurrency never exceeds
/// `parallelism` and no item is probed twice. Each worker pauses for the
/// configured cooldown after every item it completes.
pub struct ProbeOrchestrator {
    prober: ItemProber,
}

impl ProbeOrchestrator {
    pub fn new(provider: Arc<dyn ProbeProvider>) -> Self {
        Self {
            prober: ItemProber::new(provider),
        }
    }

    /// Probe all `items`.
    ///
    /// Progress is reported after each completed item as a strictly
    /// increasing percentage ending at 100. If `cancel` fires the batch
    /// stops taking items and returns [`BatchError::Cancelled`].
    pub async fn probe_batch(
        &self,
        items: Vec<Item>,
        config: &BatchConfig,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ProbeResult, BatchError> {
        let config = config.clone().validated();
        let total = items.len();

        if total == 0 {
            progress.report(100.0);
            return Ok(ProbeResult::default());
        }

        let workers = config.parallelism.min(total);
        info!(
            "Probing {} items with {} workers via {} (timeout {}s, cooldown {}ms)",
            total,
            workers,
            self.prober.provider_name(),
            config.timeout_secs,
            config.cooldown_ms
        );
        metrics::BATCH_SIZE
            .with_label_values(&[])
            .observe(total as f64);

        let cursor = AtomicUsize::new(0);
        let tally = Mutex::new(Tally::default());

        let results = join_all(
            (0..workers).map(|_| self.worker(&items, &config, &cursor, &tally, progress, cancel)),
        )
        .await;

        let tally = tally.into_inner().unwrap_or_else(PoisonError::into_inner);

        if cancel.is_cancelled() || results.iter().any(Result::is_err) {
            info!(
                "Probe batch cancelled after {} of {} items ({} probed, {} failed)",
                tally.processed, total, tally.probed, tally.failed
            );
            metrics::BATCHES_TOTAL.with_label_values(&["cancelled"]).inc();
            return Err(BatchError::Cancelled);
        }

        info!(
            "Probe batch complete: {} probed, {} failed, {} total",
            tally.probed, tally.failed, total
        );
        metrics::BATCHES_TOTAL.with_label_values(&["completed"]).inc();

        Ok(ProbeResult {
            probed: tally.probed,
            failed: tally.failed,
            failed_items: tally.failed_items,
        })
    }

    async fn worker(
        &self,
        items: &[Item],
        config: &BatchConfig,
        cursor: &AtomicUsize,
        tally: &Mutex<Tally>,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(), BatchError> {
        let total = items.len();
        let cooldown = config.cooldown();

        loop {
            if cancel.is_cancelled() {
                return Err(BatchError::Cancelled);
            }

            let Some(item) = items.get(cursor.fetch_add(1, Ordering::SeqCst)) else {
                return Ok(());
            };

            let outcome = self.prober.probe_one(item, config.timeout(), cancel).await;

            {
                let mut tally = tally.lock().unwrap_or_else(PoisonError::into_inner);
                match outcome {
                    ProbeOutcome::Succeeded => tally.probed += 1,
                    ProbeOutcome::Failed(_) => {
                        tally.failed += 1;
                        tally.failed_items.push(item.clone());
                    }
                    ProbeOutcome::Cancelled => return Err(BatchError::Cancelled),
                }
                tally.processed += 1;
                // Reported under the lock so the sink sees a monotonic sequence.
                progress.report(tally.processed as f64 / total as f64 * 100.0);
            }

            if !cooldown.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(BatchError::Cancelled),
                    _ = tokio::time::sleep(cooldown) => {}
                }
            }
        }
    }
}
