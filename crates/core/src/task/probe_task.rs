//! The scheduled probe task: select, probe, clean up.

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cleanup::{CleanupOutcome, FailureGatedCleanup, FileDeleter};
use crate::library::{LibraryStore, StoreError, UnprobedItemSelector};
use crate::probe::{BatchError, ProbeOrchestrator, ProbeSettings, ProgressSink};

pub const TASK_NAME: &str = "Probe STRM Media Info";
pub const TASK_KEY: &str = "StrmProbeMediaInfo";
pub const TASK_CATEGORY: &str = "STRM Probe";
pub const TASK_DESCRIPTION: &str =
    "Probes STRM file targets to extract media information (codec, resolution, duration, audio).";

/// When the task runs by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskTrigger {
    /// Once a day at a local wall-clock time.
    Daily { at: NaiveTime },
}

/// Default triggers: daily at 04:00.
pub fn default_triggers() -> Vec<TaskTrigger> {
    vec![TaskTrigger::Daily {
        at: NaiveTime::from_hms_opt(4, 0, 0).unwrap_or_default(),
    }]
}

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Scheduled,
    Manual,
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerSource::Scheduled => write!(f, "scheduled"),
            TriggerSource::Manual => write!(f, "manual"),
        }
    }
}

/// Outcome of one task run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub trigger: TriggerSource,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Unprobed items selected for this run.
    pub candidates: usize,
    pub probed: usize,
    pub failed: usize,
    pub cleanup: CleanupOutcome,
}

/// Errors that end a task run.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Failed to select unprobed items: {0}")]
    Store(#[from] StoreError),

    #[error("Probe task cancelled")]
    Cancelled,

    /// Something below the task panicked; the run was abandoned.
    #[error("Probe task panicked")]
    Panicked,
}

impl From<BatchError> for TaskError {
    fn from(e: BatchError) -> Self {
        match e {
            BatchError::Cancelled => TaskError::Cancelled,
        }
    }
}

/// Probes every unprobed `.strm` item in the selected libraries.
pub struct ProbeTask {
    selector: Arc<UnprobedItemSelector>,
    orchestrator: Arc<ProbeOrchestrator>,
    cleanup: FailureGatedCleanup,
}

impl ProbeTask {
    pub fn new(
        store: Arc<dyn LibraryStore>,
        orchestrator: Arc<ProbeOrchestrator>,
        deleter: Arc<dyn FileDeleter>,
    ) -> Self {
        Self {
            selector: Arc::new(UnprobedItemSelector::new(store)),
            orchestrator,
            cleanup: FailureGatedCleanup::new(deleter),
        }
    }

    pub fn name(&self) -> &'static str {
        TASK_NAME
    }

    pub fn key(&self) -> &'static str {
        TASK_KEY
    }

    pub fn category(&self) -> &'static str {
        TASK_CATEGORY
    }

    pub fn description(&self) -> &'static str {
        TASK_DESCRIPTION
    }

    pub async fn execute(
        &self,
        settings: &ProbeSettings,
        trigger: TriggerSource,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<TaskReport, TaskError> {
        let started_at = Utc::now();
        let started = Instant::now();
        let config = settings.batch_config();

        info!("Starting STRM probe task ({})", trigger);

        // Resolving items reads sidecar files.
        let selector = Arc::clone(&self.selector);
        let library_ids = config.selected_library_ids.clone();
        let items = tokio::task::spawn_blocking(move || selector.get_unprobed_items(&library_ids))
            .await
            .map_err(|e| StoreError::Backend(format!("item selection task failed: {}", e)))??;

        if items.is_empty() {
            info!("No unprobed STRM items found");
            progress.report(100.0);
            return Ok(TaskReport {
                trigger,
                started_at,
                elapsed_ms: started.elapsed().as_millis() as u64,
                candidates: 0,
                probed: 0,
                failed: 0,
                cleanup: CleanupOutcome::NothingToDelete,
            });
        }

        let candidates = items.len();
        info!(
            "Probing {} items with parallelism={}, timeout={}s, cooldown={}ms",
            candidates, config.parallelism, config.timeout_secs, config.cooldown_ms
        );

        let result = self
            .orchestrator
            .probe_batch(items, &config, progress, cancel)
            .await?;

        let cleanup = self.cleanup.maybe_delete_failed(&result, &config).await;

        info!(
            "STRM probe task finished: {} probed, {} failed",
            result.probed, result.failed
        );

        Ok(TaskReport {
            trigger,
            started_at,
            elapsed_ms: started.elapsed().as_millis() as u64,
            candidates,
            probed: result.probed,
            failed: result.failed,
            cleanup,
        })
    }
}
