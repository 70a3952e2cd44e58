//! Library store trait and errors.

use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::broadcast;

use super::types::{Item, ItemId, ItemQuery, LibraryEvent};

/// Errors raised by a library store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The id does not resolve to an item (stale or removed).
    #[error("Item not found: {0}")]
    NotFound(ItemId),

    /// The item exists but could not be loaded.
    #[error("Failed to resolve item {id}: {reason}")]
    Resolution { id: ItemId, reason: String },

    /// A library root could not be read.
    #[error("Failed to read library root {path}: {reason}")]
    RootUnavailable { path: PathBuf, reason: String },

    /// Backend failure.
    #[error("Store error: {0}")]
    Backend(String),
}

/// Read access to the media library plus change notifications.
///
/// `query_item_ids` and `resolve_item` are blocking calls: they may read
/// from disk, so async callers run them on a blocking thread.
pub trait LibraryStore: Send + Sync {
    /// Returns the ids of all items matching the query.
    fn query_item_ids(&self, query: &ItemQuery) -> Result<Vec<ItemId>, StoreError>;

    /// Loads the current state of an item.
    fn resolve_item(&self, id: &ItemId) -> Result<Item, StoreError>;

    /// Subscribes to item notifications. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<LibraryEvent>;
}
