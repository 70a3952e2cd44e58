//! Failure-gated deletion of pointer files whose probe failed.
//!
//! A high failure rate usually means the upstream provider is down rather
//! than the pointers being dead, so deletion only happens while the rate
//! stays at or under the configured threshold.

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::library::is_strm_path;
use crate::metrics;
use crate::probe::{BatchConfig, ProbeResult};

/// Result of deleting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    Failed(String),
}

/// Removes files from storage.
#[async_trait]
pub trait FileDeleter: Send + Sync {
    async fn delete_file(&self, path: &Path) -> DeleteOutcome;
}

/// Deletes files from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileDeleter;

#[async_trait]
impl FileDeleter for FsFileDeleter {
    async fn delete_file(&self, path: &Path) -> DeleteOutcome {
        match tokio::fs::remove_file(path).await {
            Ok(()) => DeleteOutcome::Deleted,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DeleteOutcome::NotFound,
            Err(e) => DeleteOutcome::Failed(e.to_string()),
        }
    }
}

/// What the cleanup step did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CleanupOutcome {
    /// Deletion is turned off.
    Disabled,
    /// The batch had no failed items.
    NothingToDelete,
    /// The failure rate was above the threshold; nothing was deleted.
    SkippedOverThreshold {
        failure_rate_percent: f64,
        threshold_percent: f64,
    },
    /// Files were deleted.
    Deleted {
        count: usize,
        failure_rate_percent: f64,
    },
}

impl CleanupOutcome {
    pub fn deleted_count(&self) -> usize {
        match self {
            CleanupOutcome::Deleted { count, .. } => *count,
            _ => 0,
        }
    }
}

/// Post-batch policy deleting the backing files of failed items.
pub struct FailureGatedCleanup {
    deleter: Arc<dyn FileDeleter>,
}

impl FailureGatedCleanup {
    pub fn new(deleter: Arc<dyn FileDeleter>) -> Self {
        Self { deleter }
    }

    /// Delete the `.strm` files of `result.failed_items` if enabled and the
    /// failure rate does not exceed the threshold. Library index entries are
    /// left alone.
    pub async fn maybe_delete_failed(
        &self,
        result: &ProbeResult,
        config: &BatchConfig,
    ) -> CleanupOutcome {
        if !config.delete_failed {
            return CleanupOutcome::Disabled;
        }
        if result.failed_items.is_empty() {
            return CleanupOutcome::NothingToDelete;
        }

        let failure_rate = result.failure_rate_percent();
        let threshold = config.delete_failure_threshold_percent;

        if failure_rate > threshold {
            warn!(
                "Failure rate {:.1}% exceeds threshold {}%, skipping deletion of {} STRM files (provider may be down)",
                failure_rate,
                threshold,
                result.failed_items.len()
            );
            metrics::CLEANUPS_SKIPPED.inc();
            return CleanupOutcome::SkippedOverThreshold {
                failure_rate_percent: failure_rate,
                threshold_percent: threshold,
            };
        }

        let mut deleted = 0usize;
        for item in &result.failed_items {
            let Some(path) = item.path.as_deref().filter(|p| is_strm_path(p)) else {
                debug!("Not deleting item {}: not a STRM file", item.id);
                continue;
            };

            match self.deleter.delete_file(path).await {
                DeleteOutcome::Deleted => {
                    info!("Deleted failed STRM file: {}", path.display());
                    deleted += 1;
                }
                DeleteOutcome::NotFound => {
                    debug!("STRM file already gone: {}", path.display());
                }
                DeleteOutcome::Failed(e) => {
                    warn!("Failed to delete STRM file {}: {}", path.display(), e);
                }
            }
        }

        metrics::FILES_DELETED.inc_by(deleted as u64);
        info!(
            "Deleted {} failed STRM files ({:.1}% failure rate)",
            deleted, failure_rate
        );

        CleanupOutcome::Deleted {
            count: deleted,
            failure_rate_percent: failure_rate,
        }
    }
}
