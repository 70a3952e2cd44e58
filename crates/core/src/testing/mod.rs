//! Testing utilities and mock implementations.
//!
//! This module provides in-memory implementations of the collaborator
//! traits, so the prober, the catch-up queue and the probe task can be
//! exercised without a real library or ffprobe.
//!
//! # Example
//!
//! ```rust,ignore
//! use strmprobe_core::testing::{fixtures, MockLibraryStore, MockProbeProvider};
//!
//! let store = MockLibraryStore::new();
//! let provider = MockProbeProvider::new();
//!
//! store.insert(fixtures::strm_item("Movie"));
//! provider.set_delay(Duration::from_millis(100)).await;
//! ```

mod mock_deleter;
mod mock_provider;
mod mock_store;

pub use mock_deleter::MockFileDeleter;
pub use mock_provider::{MockBehavior, MockProbeProvider, RecordedProbe};
pub use mock_store::MockLibraryStore;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::PathBuf;

    use crate::library::Item;

    /// Create an unprobed `.strm` item under `/media`.
    pub fn strm_item(name: &str) -> Item {
        Item::new(name, Some(PathBuf::from(format!("/media/{}.strm", name))))
    }

    /// Create an item with an arbitrary path.
    pub fn item(name: &str, path: Option<&str>) -> Item {
        Item::new(name, path.map(PathBuf::from))
    }

    /// Create `count` unprobed `.strm` items named `Item 0..count`.
    pub fn strm_items(count: usize) -> Vec<Item> {
        (0..count)
            .map(|i| strm_item(&format!("Item {}", i)))
            .collect()
    }

    /// Create a `.strm` item that already has extracted streams.
    pub fn probed_strm_item(name: &str) -> Item {
        strm_item(name).with_media_streams(2)
    }
}
