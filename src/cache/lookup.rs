//! Locating cached payloads when the current `ETag` is unknown.

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::Context;
use std::fs;
use std::io;
use std::time::SystemTime;
use tracing::debug;

use super::naming::{is_auxiliary, url_to_filename, version_prefix};
use crate::error::CacheResult;
use crate::observability::CACHE_LOG_TARGET;

/// Finds a cached payload for `url` without knowing its `ETag`.
///
/// Prefers the entry stored without an `ETag`. Otherwise returns the most
/// recently modified version of `url`, ignoring sidecar, lock, and staging
/// files. Returns `Ok(None)` when the cache directory holds nothing usable or
/// does not exist yet.
///
/// # Errors
///
/// Returns an error if the cache directory exists but cannot be listed.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use cached_path::find_cached_entry;
///
/// let cache_dir = Utf8Path::new("/var/cache/models");
/// if let Some(path) = find_cached_entry(cache_dir, "https://example.org/model.bin")? {
///     println!("serving stale copy from {path}");
/// }
/// # Ok::<(), cached_path::CacheError>(())
/// ```
pub fn find_cached_entry(cache_dir: &Utf8Path, url: &str) -> CacheResult<Option<Utf8PathBuf>> {
    let unversioned = cache_dir.join(url_to_filename(url, None));
    if unversioned.is_file() {
        return Ok(Some(unversioned));
    }
    find_latest_version(cache_dir, url)
}

/// Returns the newest `<urlhash>.*` payload in `cache_dir`.
fn find_latest_version(cache_dir: &Utf8Path, url: &str) -> CacheResult<Option<Utf8PathBuf>> {
    let entries = match fs::read_dir(cache_dir) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        listing => listing.with_context(|| format!("failed to list cache directory: {cache_dir}"))?,
    };

    let prefix = version_prefix(url);
    let newest = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            if !name.starts_with(&prefix) || is_auxiliary(&name) {
                return None;
            }
            let metadata = entry.metadata().ok()?;
            if !metadata.is_file() {
                return None;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            Some((modified, name))
        })
        .max()
        .map(|(_, name)| cache_dir.join(name));

    debug!(
        target: CACHE_LOG_TARGET,
        url,
        candidate = ?newest,
        "searched cache for a previously downloaded version"
    );
    Ok(newest)
}
