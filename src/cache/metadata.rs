//! JSON sidecar recording where a cache entry came from.

use camino::Utf8Path;
use color_eyre::eyre::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

use super::naming::metadata_path;
use crate::error::{CacheError, CacheResult};

/// Origin of a cached payload: the locator it was fetched from and the
/// `ETag` observed at the time, if any.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Locator the payload was downloaded from.
    pub url: String,
    /// `ETag` reported by the server, or `None` when it could not be probed.
    pub etag: Option<String>,
}

/// Writes the sidecar for `cache_path` atomically.
///
/// The JSON is staged in a temporary file inside the cache directory and
/// renamed over `<cache_path>.json`, so readers never observe a truncated
/// sidecar.
pub(crate) fn write_metadata(cache_path: &Utf8Path, metadata: &CacheMetadata) -> CacheResult<()> {
    let target = metadata_path(cache_path);
    let dir = cache_path.parent().unwrap_or_else(|| Utf8Path::new("."));

    let mut staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to stage cache metadata in {dir}"))?;
    serde_json::to_writer(&mut staged, metadata)
        .with_context(|| format!("failed to serialise cache metadata for {cache_path}"))?;
    staged
        .flush()
        .and_then(|()| staged.as_file().sync_all())
        .with_context(|| format!("failed to flush cache metadata for {cache_path}"))?;
    staged
        .persist(&target)
        .with_context(|| format!("failed to store cache metadata: {target}"))?;
    Ok(())
}

/// Returns `true` once both the payload and its sidecar are in place.
///
/// The payload is renamed into place before the sidecar is written, so a
/// payload alone may belong to a writer that has not finished yet.
pub(crate) fn is_complete(cache_path: &Utf8Path) -> bool {
    cache_path.is_file() && metadata_path(cache_path).is_file()
}

/// Reads the sidecar of the entry named `filename` inside `cache_dir`.
///
/// # Errors
///
/// Returns [`CacheErrorKind::NotFound`](crate::CacheErrorKind) when either the
/// payload or its sidecar is missing, and
/// [`CacheErrorKind::Other`](crate::CacheErrorKind) when the sidecar cannot
/// be read or parsed.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use cached_path::{lookup_metadata, url_to_filename};
///
/// let filename = url_to_filename("https://example.org/model.bin", Some("abc123"));
/// let metadata = lookup_metadata(&filename, Utf8Path::new("/var/cache/models"))?;
/// assert_eq!(metadata.url, "https://example.org/model.bin");
/// # Ok::<(), cached_path::CacheError>(())
/// ```
pub fn lookup_metadata(filename: &str, cache_dir: &Utf8Path) -> CacheResult<CacheMetadata> {
    let cache_path = cache_dir.join(filename);
    if !cache_path.is_file() {
        return Err(CacheError::not_found(cache_path.as_str()));
    }

    let sidecar = metadata_path(&cache_path);
    if !sidecar.is_file() {
        return Err(CacheError::not_found(sidecar.as_str()));
    }

    let raw = fs::read_to_string(&sidecar)
        .with_context(|| format!("failed to read cache metadata: {sidecar}"))?;
    let metadata = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse cache metadata: {sidecar}"))?;
    Ok(metadata)
}
