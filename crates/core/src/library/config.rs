//! Configuration for the filesystem library store.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::types::LibraryId;

/// Library section of the configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Directories scanned for items.
    #[serde(default)]
    pub roots: Vec<LibraryRootConfig>,

    /// How often the host rescans the roots for new items (seconds, 0 = never).
    #[serde(default = "default_rescan_interval")]
    pub rescan_interval_secs: u64,
}

/// One library root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryRootConfig {
    /// Stable id used by `probe.selected_library_ids`.
    pub id: LibraryId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Directory holding the library's files.
    pub path: PathBuf,
}

fn default_rescan_interval() -> u64 {
    300 // 5 minutes
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            rescan_interval_secs: default_rescan_interval(),
        }
    }
}
