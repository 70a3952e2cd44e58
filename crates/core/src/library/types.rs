//! Types shared by library stores and their consumers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Extension (without dot) that marks a remote stream pointer file.
pub const STRM_EXTENSION: &str = "strm";

/// Opaque identifier of a library item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub Uuid);

impl ItemId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a library (a top-level ancestor of items).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LibraryId(pub Uuid);

impl LibraryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LibraryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Snapshot of a library item as seen by the prober.
///
/// Items are owned by the store; the prober only reads `path` and
/// `media_stream_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub path: Option<PathBuf>,
    /// Number of media streams already extracted for this item.
    pub media_stream_count: usize,
}

impl Item {
    /// Creates an item with no extracted streams.
    pub fn new(name: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self {
            id: ItemId::new(),
            name: name.into(),
            path,
            media_stream_count: 0,
        }
    }

    /// Sets the extracted stream count.
    pub fn with_media_streams(mut self, count: usize) -> Self {
        self.media_stream_count = count;
        self
    }

    /// Whether the item's backing file is a `.strm` pointer.
    pub fn is_strm(&self) -> bool {
        self.path.as_deref().is_some_and(is_strm_path)
    }

    /// Whether the item is a `.strm` pointer with no extracted streams yet.
    pub fn needs_probe(&self) -> bool {
        self.is_strm() && self.media_stream_count == 0
    }
}

/// Case-insensitive check for a path ending in `.strm`.
pub fn is_strm_path(path: &Path) -> bool {
    let path = path.to_string_lossy();
    let suffix_len = STRM_EXTENSION.len() + 1;
    if path.len() < suffix_len || !path.is_char_boundary(path.len() - suffix_len) {
        return false;
    }
    let suffix = &path[path.len() - suffix_len..];
    suffix.starts_with('.') && suffix[1..].eq_ignore_ascii_case(STRM_EXTENSION)
}

/// Query over the store's item ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemQuery {
    /// Only return items below one of these libraries. Empty = unscoped.
    pub ancestor_ids: Vec<LibraryId>,
}

impl ItemQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the query to items below the given libraries.
    pub fn with_ancestors(mut self, ids: &[LibraryId]) -> Self {
        self.ancestor_ids = ids.to_vec();
        self
    }

    pub fn is_scoped(&self) -> bool {
        !self.ancestor_ids.is_empty()
    }
}

/// Change notification published by a library store.
#[derive(Debug, Clone)]
pub enum LibraryEvent {
    ItemAdded(Item),
    ItemRemoved(ItemId),
}
