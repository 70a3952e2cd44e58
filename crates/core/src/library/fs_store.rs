//! Filesystem-backed library store.
//!
//! Each configured root is a library. Every regular file below a root is an
//! item; sidecar files written by the prober are not. Ids are assigned the
//! first time a file is seen and kept for as long as the file exists.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::config::LibraryRootConfig;
use super::media_info::{is_sidecar_path, read_sidecar};
use super::store::{LibraryStore, StoreError};
use super::types::{Item, ItemId, ItemQuery, LibraryEvent, LibraryId};

/// Capacity of the notification channel.
const EVENT_BUFFER_SIZE: usize = 1024;

#[derive(Debug, Clone)]
struct IndexedItem {
    library: LibraryId,
    path: PathBuf,
}

#[derive(Debug, Default)]
struct Index {
    items: HashMap<ItemId, IndexedItem>,
    by_path: HashMap<PathBuf, ItemId>,
}

/// Counts from one rescan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RescanSummary {
    pub added: usize,
    pub removed: usize,
    pub total: usize,
}

/// Library store over plain directories.
pub struct FsLibraryStore {
    roots: Vec<LibraryRootConfig>,
    index: RwLock<Index>,
    events: broadcast::Sender<LibraryEvent>,
}

impl FsLibraryStore {
    /// Creates an empty store. Call [`rescan`](Self::rescan) to populate it.
    pub fn new(roots: Vec<LibraryRootConfig>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self {
            roots,
            index: RwLock::new(Index::default()),
            events,
        }
    }

    /// Configured roots.
    pub fn roots(&self) -> &[LibraryRootConfig] {
        &self.roots
    }

    /// Number of indexed items.
    pub fn len(&self) -> usize {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walks all roots, indexes new files and forgets vanished ones.
    ///
    /// Publishes `ItemAdded` for every new file and `ItemRemoved` for every
    /// vanished one. Unreadable roots are logged and skipped so one offline
    /// mount does not make every item of that library look removed.
    ///
    /// Blocking: run it on a blocking thread from async code.
    pub fn rescan(&self) -> RescanSummary {
        let mut seen: HashMap<PathBuf, LibraryId> = HashMap::new();
        let mut offline: HashSet<LibraryId> = HashSet::new();

        for root in &self.roots {
            match scan_root(&root.path) {
                Ok(files) => {
                    for file in files {
                        seen.insert(file, root.id);
                    }
                }
                Err(e) => {
                    warn!("Skipping library {} ({}): {}", root.name, root.id, e);
                    offline.insert(root.id);
                }
            }
        }

        let mut added = Vec::new();
        let mut removed = Vec::new();
        {
            let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);

            let vanished: Vec<ItemId> = index
                .items
                .iter()
                .filter(|(_, entry)| {
                    !offline.contains(&entry.library) && !seen.contains_key(&entry.path)
                })
                .map(|(id, _)| *id)
                .collect();
            for id in vanished {
                if let Some(entry) = index.items.remove(&id) {
                    index.by_path.remove(&entry.path);
                    removed.push(id);
                }
            }

            for (path, library) in seen {
                if index.by_path.contains_key(&path) {
                    continue;
                }
                let id = ItemId::new();
                index.by_path.insert(path.clone(), id);
                index.items.insert(
                    id,
                    IndexedItem {
                        library,
                        path: path.clone(),
                    },
                );
                added.push((id, path));
            }
        }

        let summary = RescanSummary {
            added: added.len(),
            removed: removed.len(),
            total: self.len(),
        };

        for (id, path) in added {
            let item = build_item(id, &path);
            // No receivers is fine: nobody is listening yet.
            let _ = self.events.send(LibraryEvent::ItemAdded(item));
        }
        for id in removed {
            let _ = self.events.send(LibraryEvent::ItemRemoved(id));
        }

        info!(
            "Library rescan: {} added, {} removed, {} total",
            summary.added, summary.removed, summary.total
        );
        summary
    }
}

impl LibraryStore for FsLibraryStore {
    fn query_item_ids(&self, query: &ItemQuery) -> Result<Vec<ItemId>, StoreError> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        let mut matches: Vec<(&PathBuf, ItemId)> = index
            .items
            .iter()
            .filter(|(_, entry)| {
                !query.is_scoped() || query.ancestor_ids.contains(&entry.library)
            })
            .map(|(id, entry)| (&entry.path, *id))
            .collect();
        matches.sort();
        Ok(matches.into_iter().map(|(_, id)| id).collect())
    }

    fn resolve_item(&self, id: &ItemId) -> Result<Item, StoreError> {
        let path = {
            let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
            index
                .items
                .get(id)
                .map(|entry| entry.path.clone())
                .ok_or(StoreError::NotFound(*id))?
        };

        let streams = read_sidecar(&path).map_err(|e| StoreError::Resolution {
            id: *id,
            reason: e.to_string(),
        })?;

        let mut item = build_item(*id, &path);
        item.media_stream_count = streams.map_or(0, |info| info.streams.len());
        Ok(item)
    }

    fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.events.subscribe()
    }
}

fn scan_root(root: &Path) -> Result<Vec<PathBuf>, StoreError> {
    if !root.is_dir() {
        return Err(StoreError::RootUnavailable {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry below {:?}: {}", root, e);
                continue;
            }
        };
        if entry.file_type().is_file() && !is_sidecar_path(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn build_item(id: ItemId, path: &Path) -> Item {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Item {
        id,
        name,
        path: Some(path.to_path_buf()),
        media_stream_count: 0,
    }
}
