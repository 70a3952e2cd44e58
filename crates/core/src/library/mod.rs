//! Library access: item model, store seam, filesystem store and the
//! unprobed item selector.

mod config;
mod fs_store;
mod media_info;
mod selector;
mod store;
mod types;

pub use config::{LibraryConfig, LibraryRootConfig};
pub use fs_store::{FsLibraryStore, RescanSummary};
pub use media_info::{
    is_sidecar_path, read_sidecar, sidecar_path, write_sidecar, MediaInfo, MediaStream,
    StreamKind, SIDECAR_SUFFIX,
};
pub use selector::UnprobedItemSelector;
pub use store::{LibraryStore, StoreError};
pub use types::{is_strm_path, Item, ItemId, ItemQuery, LibraryEvent, LibraryId, STRM_EXTENSION};
