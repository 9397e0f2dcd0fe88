//! Shared on-disk cache for remote model files.
//!
//! Entries are stored flat in a single cache directory under a name derived
//! from the locator and the resource `ETag` (see [`url_to_filename`]). Each
//! payload is accompanied by a JSON sidecar recording its origin and, while
//! being written, by a lock marker and optionally a resumable staging file.
//!
//! # Cache Location
//!
//! The cache directory is resolved in the following order:
//!
//! 1. An explicit directory supplied by the caller
//! 2. `PYTORCH_TRANSFORMERS_CACHE`
//! 3. `PYTORCH_PRETRAINED_BERT_CACHE`
//! 4. `$TORCH_HOME/transformers`
//! 5. `$XDG_CACHE_HOME/torch/transformers`
//! 6. `~/.cache/torch/transformers`
//!
//! # Cross-Process Coordination
//!
//! Downloads take an exclusive advisory lock scoped to one entry, so
//! different entries are populated concurrently while duplicate requests for
//! the same entry wait and then reuse the finished download.

mod config;
mod lock;
mod lookup;
mod metadata;
mod naming;
mod populate;

pub use config::{
    CACHE_DIR_SOURCES, CacheDirSource, CacheSettings, DEFAULT_ETAG_TIMEOUT,
    DEFAULT_OBJECT_STORE_ENDPOINT, resolve_cache_dir, resolve_cache_dir_with,
};
pub use lock::CacheLock;
pub use lookup::find_cached_entry;
pub use metadata::{CacheMetadata, lookup_metadata};
pub use naming::{incomplete_path, lock_path, metadata_path, url_to_filename};

pub(crate) use metadata::is_complete;
pub(crate) use populate::{PopulateRequest, populate_entry};
