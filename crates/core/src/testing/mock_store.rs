//! Mock library store for testing.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::library::{
    Item, ItemId, ItemQuery, LibraryEvent, LibraryId, LibraryStore, StoreError,
};

#[derive(Default)]
struct StoreState {
    /// Ids in insertion order, including unresolvable ones.
    order: Vec<ItemId>,
    items: HashMap<ItemId, Item>,
    libraries: HashMap<ItemId, LibraryId>,
    queries: Vec<ItemQuery>,
    next_query_error: Option<String>,
    resolve_calls: usize,
    resolve_delay: Duration,
}

/// In-memory implementation of the LibraryStore trait.
///
/// Provides controllable behavior for testing:
/// - Insert items, optionally below a library
/// - Register ids that fail to resolve
/// - Fail the next query
/// - Emit item notifications to subscribers
/// - Record queries for assertions
/// - Block the calling thread on resolve, like a store reading from disk
pub struct MockLibraryStore {
    state: Mutex<StoreState>,
    events: broadcast::Sender<LibraryEvent>,
}

impl Default for MockLibraryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLibraryStore {
    /// Create an empty mock store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            state: Mutex::new(StoreState::default()),
            events,
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace an item.
    pub fn insert(&self, item: Item) {
        let mut state = self.state();
        if !state.order.contains(&item.id) {
            state.order.push(item.id);
        }
        state.items.insert(item.id, item);
    }

    /// Insert an item below a library.
    pub fn insert_in_library(&self, library: LibraryId, item: Item) {
        self.state().libraries.insert(item.id, library);
        self.insert(item);
    }

    /// Register an id that is returned by queries but fails to resolve.
    pub fn add_unresolvable(&self, id: ItemId) {
        let mut state = self.state();
        state.order.push(id);
        state.items.remove(&id);
    }

    /// Remove an item so that it no longer resolves.
    pub fn remove(&self, id: &ItemId) {
        let mut state = self.state();
        state.items.remove(id);
        state.order.retain(|existing| existing != id);
    }

    /// Make the next query fail with a backend error.
    pub fn fail_next_query(&self, reason: &str) {
        self.state().next_query_error = Some(reason.to_string());
    }

    /// Get all recorded queries.
    pub fn recorded_queries(&self) -> Vec<ItemQuery> {
        self.state().queries.clone()
    }

    /// Make every resolve block the calling thread for `delay`.
    pub fn set_resolve_delay(&self, delay: Duration) {
        self.state().resolve_delay = delay;
    }

    /// Number of resolve calls made.
    pub fn resolve_count(&self) -> usize {
        self.state().resolve_calls
    }

    /// Send a notification to subscribers. Returns the number of receivers.
    pub fn emit(&self, event: LibraryEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    /// Insert an item and notify subscribers that it was added.
    pub fn add_and_notify(&self, item: Item) -> usize {
        self.insert(item.clone());
        self.emit(LibraryEvent::ItemAdded(item))
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

impl LibraryStore for MockLibraryStore {
    fn query_item_ids(&self, query: &ItemQuery) -> Result<Vec<ItemId>, StoreError> {
        let mut state = self.state();
        state.queries.push(query.clone());

        if let Some(reason) = state.next_query_error.take() {
            return Err(StoreError::Backend(reason));
        }

        Ok(state
            .order
            .iter()
            .filter(|id| {
                !query.is_scoped()
                    || state
                        .libraries
                        .get(*id)
                        .is_some_and(|lib| query.ancestor_ids.contains(lib))
            })
            .copied()
            .collect())
    }

    fn resolve_item(&self, id: &ItemId) -> Result<Item, StoreError> {
        let delay = {
            let mut state = self.state();
            state.resolve_calls += 1;
            state.resolve_delay
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.state()
            .items
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound(*id))
    }

    fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.events.subscribe()
    }
}
