//! Background loops: the daily probe trigger and the periodic library rescan.

use chrono::{Local, NaiveTime};
use std::sync::Arc;
use std::time::Duration;
use strmprobe_core::{next_daily_run, FsLibraryStore, RunnerError, TaskRunner, TriggerSource};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Trigger the probe task once a day at `at` (local time) until `shutdown` fires.
///
/// A trigger that lands while a run is in flight is skipped.
pub async fn run_daily(runner: Arc<TaskRunner>, at: NaiveTime, shutdown: CancellationToken) {
    loop {
        let now = Local::now().naive_local();
        let next = next_daily_run(now, at);
        let wait = (next - now).to_std().unwrap_or_default();
        info!("Next scheduled probe run at {}", next);

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        match runner.trigger(TriggerSource::Scheduled) {
            Ok(_) => info!("Scheduled probe run started"),
            Err(RunnerError::AlreadyRunning) => {
                warn!("Skipping scheduled probe run: a run is already in progress")
            }
        }
    }
    debug!("Daily scheduler stopped");
}

/// Rescan the library roots every `interval` until `shutdown` fires.
///
/// The first tick fires after one full interval; the host scans once at startup.
pub async fn run_rescan_loop(
    store: Arc<FsLibraryStore>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let store = Arc::clone(&store);
        // The store logs the summary itself.
        if let Err(e) = tokio::task::spawn_blocking(move || store.rescan()).await {
            error!("Library rescan task failed: {}", e);
        }
    }
    debug!("Rescan loop stopped");
}
