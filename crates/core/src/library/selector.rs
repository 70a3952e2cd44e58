//! Selection of items that still need a probe.

use std::sync::Arc;

use tracing::{debug, info};

use super::store::{LibraryStore, StoreError};
use super::types::{Item, ItemQuery, LibraryId};

/// Finds `.strm` items without extracted media streams.
pub struct UnprobedItemSelector {
    store: Arc<dyn LibraryStore>,
}

impl UnprobedItemSelector {
    pub fn new(store: Arc<dyn LibraryStore>) -> Self {
        Self { store }
    }

    /// Returns the unprobed `.strm` items below `library_ids` (all libraries
    /// when empty), in store order.
    ///
    /// Ids that fail to resolve are skipped; only a failing query aborts.
    pub fn get_unprobed_items(&self, library_ids: &[LibraryId]) -> Result<Vec<Item>, StoreError> {
        let query = ItemQuery::new().with_ancestors(library_ids);
        let item_ids = self.store.query_item_ids(&query)?;
        info!("Query returned {} item IDs", item_ids.len());

        let mut unprobed = Vec::new();
        let mut resolved = 0usize;

        for id in &item_ids {
            let item = match self.store.resolve_item(id) {
                Ok(item) => item,
                Err(e) => {
                    debug!("Skipping item {}: failed to resolve: {}", id, e);
                    continue;
                }
            };
            resolved += 1;

            if item.needs_probe() {
                unprobed.push(item);
            }
        }

        info!(
            "Found {} unprobed STRM items out of {} resolved ({} IDs queried)",
            unprobed.len(),
            resolved,
            item_ids.len()
        );

        Ok(unprobed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockLibraryStore};
    use crate::library::ItemId;

    fn selector(store: &Arc<MockLibraryStore>) -> UnprobedItemSelector {
        UnprobedItemSelector::new(Arc::clone(store) as Arc<dyn LibraryStore>)
    }

    #[test]
    fn test_filters_to_strm_paths() {
        let store = Arc::new(MockLibraryStore::new());
        store.insert(fixtures::strm_item("STRM Movie"));
        store.insert(fixtures::item("MKV Movie", Some("/media/movie.mkv")));
        store.insert(fixtures::item("No Path", None));

        let result = selector(&store).get_unprobed_items(&[]).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "STRM Movie");
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let store = Arc::new(MockLibraryStore::new());
        store.insert(fixtures::item("Upper", Some("/media/movie.STRM")));
        store.insert(fixtures::item("Mixed", Some("/media/movie.Strm")));

        let result = selector(&store).get_unprobed_items(&[]).unwrap();

        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_skips_already_probed_items() {
        let store = Arc::new(MockLibraryStore::new());
        store.insert(fixtures::strm_item("Probed").with_media_streams(3));
        store.insert(fixtures::strm_item("Fresh"));

        let result = selector(&store).get_unprobed_items(&[]).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "Fresh");
    }

    #[test]
    fn test_skips_unresolvable_ids() {
        let store = Arc::new(MockLibraryStore::new());
        let good = fixtures::strm_item("Good STRM");
        store.insert(good.clone());
        let bad = ItemId::new();
        store.add_unresolvable(bad);

        let result = selector(&store).get_unprobed_items(&[]).unwrap();

        assert_eq!(result, vec![good]);
    }

    #[test]
    fn test_scopes_query_to_selected_libraries() {
        let store = Arc::new(MockLibraryStore::new());
        let lib = LibraryId::new();
        let other = LibraryId::new();
        store.insert_in_library(lib, fixtures::strm_item("In Library"));
        store.insert_in_library(other, fixtures::strm_item("Elsewhere"));

        let result = selector(&store).get_unprobed_items(&[lib]).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "In Library");
        assert_eq!(store.recorded_queries()[0].ancestor_ids, vec![lib]);
    }

    #[test]
    fn test_unscoped_query_when_no_libraries_selected() {
        let store = Arc::new(MockLibraryStore::new());

        let result = selector(&store).get_unprobed_items(&[]).unwrap();

        assert!(result.is_empty());
        assert!(!store.recorded_queries()[0].is_scoped());
    }

    #[test]
    fn test_query_failure_is_returned() {
        let store = Arc::new(MockLibraryStore::new());
        store.fail_next_query("index offline");

        let result = selector(&store).get_unprobed_items(&[]);

        assert!(matches!(result, Err(StoreError::Backend(_))));
    }
}
