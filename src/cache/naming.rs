//! Deterministic cache filenames.
//!
//! A cache entry is named after the SHA-256 of its locator, optionally
//! followed by the SHA-256 of the resource `ETag`. A `.h5` suffix on the
//! locator is carried over so weight loaders can still sniff the format from
//! the filename. Sidecar, lock, and staging files sit beside the payload with
//! fixed extensions appended.

use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};

/// Extension of the JSON sidecar recording `{url, etag}`.
pub(crate) const METADATA_SUFFIX: &str = ".json";
/// Extension of the advisory lock marker.
pub(crate) const LOCK_SUFFIX: &str = ".lock";
/// Extension of the resumable staging file.
pub(crate) const INCOMPLETE_SUFFIX: &str = ".incomplete";
/// Locator suffixes preserved on the cache filename.
const PRESERVED_SUFFIXES: [&str; 1] = [".h5"];

/// Hex-encoded SHA-256 of `value`.
fn sha256_hex(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    format!("{digest:x}")
}

/// Derives the cache filename for a locator and optional `ETag`.
///
/// # Examples
///
/// ```
/// use cached_path::url_to_filename;
///
/// let plain = url_to_filename("https://example.org/model.bin", None);
/// assert_eq!(plain.len(), 64);
///
/// let versioned = url_to_filename("https://example.org/model.bin", Some("abc123"));
/// assert!(versioned.starts_with(&plain));
/// assert_eq!(versioned.len(), 64 + 1 + 64);
///
/// let weights = url_to_filename("https://example.org/tf_model.h5", None);
/// assert!(weights.ends_with(".h5"));
/// ```
#[must_use]
pub fn url_to_filename(url: &str, etag: Option<&str>) -> String {
    let mut filename = sha256_hex(url);
    if let Some(tag) = etag {
        filename.push('.');
        filename.push_str(&sha256_hex(tag));
    }
    if let Some(suffix) = PRESERVED_SUFFIXES
        .iter()
        .find(|suffix| url.ends_with(*suffix))
    {
        filename.push_str(suffix);
    }
    filename
}

/// Prefix shared by every cached version of `url`, regardless of `ETag`.
pub(crate) fn version_prefix(url: &str) -> String {
    format!("{}.", sha256_hex(url))
}

/// Returns `true` for names of sidecar, lock, or staging artifacts.
pub(crate) fn is_auxiliary(name: &str) -> bool {
    [METADATA_SUFFIX, LOCK_SUFFIX, INCOMPLETE_SUFFIX]
        .iter()
        .any(|suffix| name.ends_with(suffix))
}

fn with_suffix(cache_path: &Utf8Path, suffix: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{cache_path}{suffix}"))
}

/// Path of the JSON sidecar for a payload.
#[must_use]
pub fn metadata_path(cache_path: &Utf8Path) -> Utf8PathBuf {
    with_suffix(cache_path, METADATA_SUFFIX)
}

/// Path of the advisory lock for a payload.
#[must_use]
pub fn lock_path(cache_path: &Utf8Path) -> Utf8PathBuf {
    with_suffix(cache_path, LOCK_SUFFIX)
}

/// Path of the resumable staging file for a payload.
#[must_use]
pub fn incomplete_path(cache_path: &Utf8Path) -> Utf8PathBuf {
    with_suffix(cache_path, INCOMPLETE_SUFFIX)
}
