//! Resolves "path or URL" arguments into local files, downloading and caching
//! remote model files on the way.
//!
//! Remote resources (`http://`, `https://` and `s3://bucket/key`) are stored
//! in a shared cache directory under a name derived from the locator and its
//! `ETag`, so a changed upstream file is fetched again while an unchanged one
//! is served from disk. Concurrent callers, including other processes,
//! coordinate through a per-entry file lock so each resource is downloaded
//! once.
//!
//! ```no_run
//! use cached_path::{ResolveOptions, cached_path};
//!
//! let config = cached_path("https://example.org/bert/config.json", &ResolveOptions::default())?;
//! let local = cached_path("./vocab.txt", &ResolveOptions::default())?;
//! # Ok::<(), cached_path::CachedPathError>(())
//! ```

mod backends;
mod cache;
mod error;
mod extract;
mod fs;
mod locator;
mod observability;
mod progress;
mod resolve;
#[cfg(any(test, feature = "test-support"))]
#[doc(hidden)]
pub mod test_support;
mod transport;

pub use backends::{
    Backend, BackendAvailability, BackendProbe, BackendToggle, LibraryProbe, USE_TF_ENV,
    USE_TORCH_ENV,
};
pub use cache::{
    CACHE_DIR_SOURCES, CacheDirSource, CacheLock, CacheMetadata, CacheSettings,
    DEFAULT_ETAG_TIMEOUT, DEFAULT_OBJECT_STORE_ENDPOINT, find_cached_entry, incomplete_path,
    lock_path, lookup_metadata, metadata_path, resolve_cache_dir, resolve_cache_dir_with,
    url_to_filename,
};
pub use error::{
    CacheError, CacheErrorKind, CacheResult, CachedPathError, ConfigError, ConfigResult, Result,
};
pub use extract::{ArchiveFormat, detect_archive, extract_if_archive, extraction_dir};
pub use locator::{Locator, RemoteLocator, bucket_url, is_remote_url};
pub use resolve::{RemoteFileCache, ResolveOptions};
pub use transport::{
    Download, DownloadRequest, Fetched, HttpTransport, Transport, TransportError, UserAgent,
    user_agent_header,
};

use color_eyre::eyre::{Context, eyre};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::time::Duration;
use url::Url;

use camino::Utf8PathBuf;

/// Accepted range for the `ETag` probe timeout, in seconds.
const ETAG_TIMEOUT_RANGE: std::ops::RangeInclusive<u64> = 1..=600;

/// Captures cache settings supplied via `CACHED_PATH_*` environment variables
/// and configuration files.
///
/// # Examples
/// ```
/// use cached_path::FetchEnvCfg;
///
/// let cfg = FetchEnvCfg::default();
/// assert!(cfg.etag_timeout_secs.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, OrthoConfig, Default)]
#[ortho_config(prefix = "CACHED_PATH")]
pub struct FetchEnvCfg {
    /// Cache directory overriding the `PYTORCH_*`/`TORCH_HOME` resolution.
    pub cache_dir: Option<Utf8PathBuf>,
    /// Upper bound on the `ETag` probe in seconds (1 to 600).
    pub etag_timeout_secs: Option<u64>,
    /// Proxy URL applied to every outbound request.
    pub proxy: Option<String>,
    /// Endpoint serving `s3://` objects, addressed path-style.
    pub object_store_endpoint: Option<String>,
    /// Extra user-agent text attached to every download.
    pub user_agent: Option<String>,
    /// Never touch the network; serve cached files only.
    pub local_files_only: Option<bool>,
}

impl FetchEnvCfg {
    /// Loads configuration from environment variables without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a value cannot be parsed.
    pub fn load() -> ConfigResult<Self> {
        let args = [OsString::from("cached-path")];
        Self::load_from_iter(args).map_err(|err| ConfigError::from(eyre!(err)))
    }

    /// Converts the configuration into [`CacheSettings`].
    ///
    /// Unset values keep their defaults: the resolved cache directory, a
    /// ten-second `ETag` timeout, and the public S3 endpoint.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the timeout is out of range or the
    /// object-storage endpoint is not a usable base URL.
    pub fn to_settings(&self) -> ConfigResult<CacheSettings> {
        let mut settings = CacheSettings::with_dir(resolve_cache_dir_with(self.cache_dir.as_deref()));

        self.apply_timeout(&mut settings)?;
        self.apply_network(&mut settings)?;
        self.apply_behaviour(&mut settings);

        Ok(settings)
    }

    fn apply_timeout(&self, settings: &mut CacheSettings) -> ConfigResult<()> {
        if let Some(secs) = self.etag_timeout_secs {
            if !ETAG_TIMEOUT_RANGE.contains(&secs) {
                return Err(ConfigError::from(eyre!(
                    "CACHED_PATH_ETAG_TIMEOUT_SECS must be between {} and {} seconds, got {secs}",
                    ETAG_TIMEOUT_RANGE.start(),
                    ETAG_TIMEOUT_RANGE.end()
                )));
            }
            settings.etag_timeout = Duration::from_secs(secs);
        }
        Ok(())
    }

    fn apply_network(&self, settings: &mut CacheSettings) -> ConfigResult<()> {
        if let Some(ref raw) = self.object_store_endpoint {
            let endpoint =
                Url::parse(raw).context("CACHED_PATH_OBJECT_STORE_ENDPOINT is not a valid URL")?;
            if endpoint.cannot_be_a_base() {
                return Err(ConfigError::from(eyre!(
                    "CACHED_PATH_OBJECT_STORE_ENDPOINT must be a base URL, got {raw}"
                )));
            }
            settings.object_store_endpoint = endpoint;
        }
        if let Some(ref proxy) = self.proxy {
            settings.proxy = Some(proxy.clone());
        }
        Ok(())
    }

    fn apply_behaviour(&self, settings: &mut CacheSettings) {
        if let Some(ref agent) = self.user_agent {
            settings.user_agent = Some(agent.clone());
        }
        if let Some(offline) = self.local_files_only {
            settings.local_files_only = offline;
        }
    }
}

/// Resolves `locator` using settings loaded from the environment.
///
/// This is the one-call entry point: it loads [`FetchEnvCfg`], builds an
/// HTTP-backed [`RemoteFileCache`] and resolves the locator through it.
///
/// # Errors
///
/// Returns [`CachedPathError::Config`] for invalid configuration and
/// [`CachedPathError::Cache`] when resolution fails.
pub fn cached_path(locator: &str, options: &ResolveOptions) -> Result<Utf8PathBuf> {
    let settings = FetchEnvCfg::load()?.to_settings()?;
    let cache = RemoteFileCache::new(settings)?;
    Ok(cache.resolve(locator, options)?)
}
