//! Mock file deleter for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::cleanup::{DeleteOutcome, FileDeleter};

/// Mock implementation of the FileDeleter trait.
///
/// Deletes nothing. Every path reports `Deleted` unless an outcome was
/// configured for it.
#[derive(Debug, Default)]
pub struct MockFileDeleter {
    outcomes: Arc<RwLock<HashMap<PathBuf, DeleteOutcome>>>,
    attempted: Arc<RwLock<Vec<PathBuf>>>,
}

impl MockFileDeleter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the outcome for one path.
    pub async fn set_outcome(&self, path: impl Into<PathBuf>, outcome: DeleteOutcome) {
        self.outcomes.write().await.insert(path.into(), outcome);
    }

    /// Every path passed to `delete_file`.
    pub async fn attempted_paths(&self) -> Vec<PathBuf> {
        self.attempted.read().await.clone()
    }

    /// Paths whose deletion reported `Deleted`.
    pub async fn deleted_paths(&self) -> Vec<PathBuf> {
        let outcomes = self.outcomes.read().await;
        self.attempted
            .read()
            .await
            .iter()
            .filter(|p| matches!(outcomes.get(*p), None | Some(DeleteOutcome::Deleted)))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl FileDeleter for MockFileDeleter {
    async fn delete_file(&self, path: &Path) -> DeleteOutcome {
        self.attempted.write().await.push(path.to_path_buf());
        self.outcomes
            .read()
            .await
            .get(path)
            .cloned()
            .unwrap_or(DeleteOutcome::Deleted)
    }
}
