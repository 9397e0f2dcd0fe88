//! Configuration for the shared file cache.
//!
//! Resolves the cache directory from an ordered list of sources and carries
//! the process-wide settings every resolution needs.

use std::env;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use url::Url;

use crate::backends::BackendAvailability;

/// Subdirectory appended to the Torch home directory.
const CACHE_SUBDIR: &str = "transformers";
/// Torch home subdirectory within an XDG-style cache root.
const TORCH_SUBDIR: &str = "torch";

/// Default bound applied to the `ETag` probe.
pub const DEFAULT_ETAG_TIMEOUT: Duration = Duration::from_secs(10);
/// Default object-storage endpoint used for `s3://` locators.
pub const DEFAULT_OBJECT_STORE_ENDPOINT: &str = "https://s3.amazonaws.com";

/// A place the cache directory may be configured.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CacheDirSource {
    /// An environment variable naming the cache directory itself.
    EnvVar(&'static str),
    /// `$TORCH_HOME/transformers`.
    TorchHome,
    /// `$XDG_CACHE_HOME/torch/transformers`.
    XdgCacheHome,
    /// `~/.cache/torch/transformers`.
    HomeDir,
}

/// Sources consulted, in order, when no explicit directory is supplied.
pub const CACHE_DIR_SOURCES: [CacheDirSource; 5] = [
    CacheDirSource::EnvVar("PYTORCH_TRANSFORMERS_CACHE"),
    CacheDirSource::EnvVar("PYTORCH_PRETRAINED_BERT_CACHE"),
    CacheDirSource::TorchHome,
    CacheDirSource::XdgCacheHome,
    CacheDirSource::HomeDir,
];

impl CacheDirSource {
    /// Resolves this source against the current environment.
    #[must_use]
    pub fn resolve(self) -> Option<Utf8PathBuf> {
        match self {
            Self::EnvVar(name) => env_path(name),
            Self::TorchHome => env_path("TORCH_HOME").map(|home| home.join(CACHE_SUBDIR)),
            Self::XdgCacheHome => env_path("XDG_CACHE_HOME")
                .map(|cache| cache.join(TORCH_SUBDIR).join(CACHE_SUBDIR)),
            Self::HomeDir => {
                let home = Utf8PathBuf::from_path_buf(dirs::home_dir()?).ok()?;
                Some(home.join(".cache").join(TORCH_SUBDIR).join(CACHE_SUBDIR))
            }
        }
    }
}

/// Resolves the cache directory from environment and home-directory conventions.
///
/// The resolution order is:
///
/// 1. `PYTORCH_TRANSFORMERS_CACHE`
/// 2. `PYTORCH_PRETRAINED_BERT_CACHE` (legacy)
/// 3. `$TORCH_HOME/transformers`
/// 4. `$XDG_CACHE_HOME/torch/transformers`
/// 5. `~/.cache/torch/transformers`
/// 6. `<temp dir>/torch/transformers` as last resort
///
/// Empty and whitespace-only variables are skipped; a leading `~/` is
/// expanded to the home directory.
///
/// # Examples
///
/// ```
/// use cached_path::resolve_cache_dir;
///
/// let cache_dir = resolve_cache_dir();
/// assert!(!cache_dir.as_str().is_empty());
/// ```
#[must_use]
pub fn resolve_cache_dir() -> Utf8PathBuf {
    CACHE_DIR_SOURCES
        .iter()
        .find_map(|source| source.resolve())
        .unwrap_or_else(temp_cache_dir)
}

/// Resolves the cache directory, preferring an explicit argument.
#[must_use]
pub fn resolve_cache_dir_with(explicit: Option<&Utf8Path>) -> Utf8PathBuf {
    explicit.map_or_else(resolve_cache_dir, Utf8Path::to_path_buf)
}

fn temp_cache_dir() -> Utf8PathBuf {
    let temp = Utf8PathBuf::from_path_buf(env::temp_dir())
        .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"));
    temp.join(TORCH_SUBDIR).join(CACHE_SUBDIR)
}

/// Reads a non-empty, UTF-8 path from `name`, expanding a leading `~/`.
fn env_path(name: &str) -> Option<Utf8PathBuf> {
    let raw = env::var(name).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(expand_home(trimmed))
}

fn expand_home(raw: &str) -> Utf8PathBuf {
    let home = || dirs::home_dir().and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok());
    let expanded = if raw == "~" {
        home()
    } else {
        raw.strip_prefix("~/")
            .and_then(|rest| home().map(|dir| dir.join(rest)))
    };
    expanded.unwrap_or_else(|| Utf8PathBuf::from(raw))
}

/// Settings shared by every resolution performed through a cache.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Default root directory for cache entries.
    pub cache_dir: Utf8PathBuf,
    /// Backends detected once for this process.
    pub backends: BackendAvailability,
    /// Upper bound on the `ETag` probe.
    pub etag_timeout: Duration,
    /// Proxy URL applied to every outbound request.
    pub proxy: Option<String>,
    /// Endpoint serving `s3://` objects, addressed path-style.
    pub object_store_endpoint: Url,
    /// Never touch the network; serve cached files only.
    pub local_files_only: bool,
    /// Extra user-agent text attached to every download.
    pub user_agent: Option<String>,
}

impl CacheSettings {
    /// Creates settings using the resolved cache directory and detected backends.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dir(resolve_cache_dir())
    }

    /// Creates settings rooted at a custom directory.
    #[must_use]
    pub fn with_dir(cache_dir: Utf8PathBuf) -> Self {
        Self {
            cache_dir,
            backends: BackendAvailability::current(),
            etag_timeout: DEFAULT_ETAG_TIMEOUT,
            proxy: None,
            object_store_endpoint: default_object_store_endpoint(),
            local_files_only: false,
            user_agent: None,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::new()
    }
}

#[expect(
    clippy::expect_used,
    reason = "the default endpoint is a constant, valid URL"
)]
pub(crate) fn default_object_store_endpoint() -> Url {
    Url::parse(DEFAULT_OBJECT_STORE_ENDPOINT).expect("default object-store endpoint is valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use temp_env::with_vars;

    const ALL_VARS: [&str; 4] = [
        "PYTORCH_TRANSFORMERS_CACHE",
        "PYTORCH_PRETRAINED_BERT_CACHE",
        "TORCH_HOME",
        "XDG_CACHE_HOME",
    ];

    fn resolve_with(vars: &[(&str, &str)]) -> Utf8PathBuf {
        let overrides: Vec<(&str, Option<&str>)> = ALL_VARS
            .iter()
            .map(|name| {
                let value = vars
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| *value);
                (*name, value)
            })
            .collect();
        with_vars(overrides, resolve_cache_dir)
    }

    #[test]
    #[serial]
    fn resolve_cache_dir_respects_primary_env_var() {
        let result = resolve_with(&[
            ("PYTORCH_TRANSFORMERS_CACHE", "/custom/cache"),
            ("PYTORCH_PRETRAINED_BERT_CACHE", "/legacy/cache"),
        ]);
        assert_eq!(result.as_str(), "/custom/cache");
    }

    #[test]
    #[serial]
    fn resolve_cache_dir_falls_back_to_legacy_env_var() {
        let result = resolve_with(&[("PYTORCH_PRETRAINED_BERT_CACHE", "/legacy/cache")]);
        assert_eq!(result.as_str(), "/legacy/cache");
    }

    #[test]
    #[serial]
    fn resolve_cache_dir_uses_torch_home() {
        let result = resolve_with(&[
            ("TORCH_HOME", "/opt/torch"),
            ("XDG_CACHE_HOME", "/home/user/.cache"),
        ]);
        assert_eq!(result.as_str(), "/opt/torch/transformers");
    }

    #[test]
    #[serial]
    fn resolve_cache_dir_uses_xdg_cache_home() {
        let result = resolve_with(&[("XDG_CACHE_HOME", "/home/user/.cache")]);
        assert_eq!(result.as_str(), "/home/user/.cache/torch/transformers");
    }

    #[test]
    #[serial]
    fn resolve_cache_dir_ignores_whitespace_only_env_var() {
        let result = resolve_with(&[
            ("PYTORCH_TRANSFORMERS_CACHE", "   "),
            ("XDG_CACHE_HOME", "/home/user/.cache"),
        ]);
        assert_eq!(result.as_str(), "/home/user/.cache/torch/transformers");
    }

    #[test]
    #[serial]
    fn resolve_cache_dir_defaults_under_torch_subdir() {
        let result = resolve_with(&[]);
        assert!(result.ends_with("torch/transformers"));
    }

    #[test]
    fn explicit_directory_wins() {
        let explicit = Utf8PathBuf::from("/explicit/cache");
        assert_eq!(resolve_cache_dir_with(Some(&explicit)), explicit);
    }

    #[test]
    fn home_prefix_is_expanded() {
        let expanded = expand_home("~/models");
        assert!(expanded.ends_with("models"));
        assert!(!expanded.as_str().starts_with('~') || dirs::home_dir().is_none());
    }

    #[test]
    fn settings_with_dir_uses_provided_path() {
        let custom = Utf8PathBuf::from("/custom/path");
        let settings = CacheSettings::with_dir(custom.clone());
        assert_eq!(settings.cache_dir, custom);
        assert_eq!(settings.etag_timeout, DEFAULT_ETAG_TIMEOUT);
        assert_eq!(
            settings.object_store_endpoint.as_str(),
            "https://s3.amazonaws.com/"
        );
    }
}
