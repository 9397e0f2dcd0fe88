//! Resolution of "path or URL" arguments into local files.
//!
//! [`RemoteFileCache::resolve`] returns local paths unchanged and turns
//! remote locators into cache entries, downloading them at most once per
//! `ETag`. The fast path, taken when the payload and its sidecar both exist,
//! never touches the entry lock.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info_span, warn};

use crate::cache::{
    CacheMetadata, CacheSettings, PopulateRequest, find_cached_entry, is_complete,
    lookup_metadata, populate_entry, url_to_filename,
};
use crate::error::{CacheError, CacheResult};
use crate::extract::extract_if_archive;
use crate::fs::ensure_dir_exists;
use crate::locator::{Locator, RemoteLocator, has_scheme};
use crate::observability::{CACHE_LOG_TARGET, LOG_TARGET};
use crate::transport::{HttpTransport, Transport, UserAgent, user_agent_header};

/// Per-call controls for [`RemoteFileCache::resolve`].
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Cache directory overriding [`CacheSettings::cache_dir`].
    pub cache_dir: Option<Utf8PathBuf>,
    /// Download even when a cached copy exists.
    pub force_download: bool,
    /// Continue a previously interrupted download from its staging file.
    pub resume_download: bool,
    /// Extra user-agent information for this call.
    pub user_agent: Option<UserAgent>,
    /// Extract zip and tar archives and return the extraction directory.
    pub extract_compressed_file: bool,
    /// Re-extract even when a previous extraction exists.
    pub force_extract: bool,
    /// Never touch the network; serve cached files only.
    pub local_files_only: bool,
}

/// Resolves locators through a shared cache directory.
///
/// # Examples
///
/// ```no_run
/// use cached_path::{CacheSettings, RemoteFileCache, ResolveOptions};
///
/// let cache = RemoteFileCache::new(CacheSettings::new())?;
/// let path = cache.resolve(
///     "https://example.org/model.bin",
///     &ResolveOptions::default(),
/// )?;
/// assert!(path.is_file());
/// # Ok::<(), cached_path::CacheError>(())
/// ```
#[derive(Debug)]
pub struct RemoteFileCache<T = HttpTransport> {
    settings: CacheSettings,
    transport: T,
}

impl RemoteFileCache<HttpTransport> {
    /// Builds a cache that fetches over HTTP.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be configured from
    /// `settings`.
    pub fn new(settings: CacheSettings) -> CacheResult<Self> {
        let transport = HttpTransport::new(&settings)?;
        Ok(Self {
            settings,
            transport,
        })
    }
}

impl<T: Transport> RemoteFileCache<T> {
    /// Builds a cache around an explicit transport.
    #[must_use]
    pub const fn with_transport(settings: CacheSettings, transport: T) -> Self {
        Self {
            settings,
            transport,
        }
    }

    /// Settings shared by every resolution.
    #[must_use]
    pub const fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Transport used for remote locators.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns a local path for `locator`.
    ///
    /// Existing local paths are returned unchanged. Remote locators are
    /// served from the cache, downloading them when no usable copy exists.
    ///
    /// # Errors
    ///
    /// - [`CacheErrorKind::NotFound`](crate::CacheErrorKind) for missing local
    ///   paths and missing remote resources.
    /// - [`CacheErrorKind::InvalidLocator`](crate::CacheErrorKind) when the
    ///   locator is neither a supported URL nor an existing path.
    /// - [`CacheErrorKind::OfflineCacheMiss`](crate::CacheErrorKind) when
    ///   network access is disabled and nothing is cached.
    /// - [`CacheErrorKind::Transport`](crate::CacheErrorKind) when the
    ///   download fails.
    /// - [`CacheErrorKind::Extraction`](crate::CacheErrorKind) when a
    ///   requested extraction fails.
    pub fn resolve(&self, locator: &str, options: &ResolveOptions) -> CacheResult<Utf8PathBuf> {
        let _span = info_span!(target: LOG_TARGET, "resolve", locator).entered();
        let resolved = match Locator::parse(locator)? {
            Locator::Remote(remote) => self.resolve_remote(&remote, options)?,
            Locator::Local(path) => resolve_local(locator, path)?,
        };

        if !options.extract_compressed_file || !resolved.is_file() {
            return Ok(resolved);
        }
        extract_if_archive(&resolved, options.force_extract)
    }

    /// Reads the origin recorded for a cache entry.
    ///
    /// `cache_dir` defaults to [`CacheSettings::cache_dir`].
    ///
    /// # Errors
    ///
    /// Returns [`CacheErrorKind::NotFound`](crate::CacheErrorKind) when the
    /// payload or its sidecar is missing.
    pub fn lookup_metadata(
        &self,
        filename: &str,
        cache_dir: Option<&Utf8Path>,
    ) -> CacheResult<CacheMetadata> {
        lookup_metadata(filename, cache_dir.unwrap_or(&self.settings.cache_dir))
    }

    fn resolve_remote(
        &self,
        remote: &RemoteLocator,
        options: &ResolveOptions,
    ) -> CacheResult<Utf8PathBuf> {
        let cache_dir = options
            .cache_dir
            .as_deref()
            .unwrap_or(&self.settings.cache_dir);
        ensure_dir_exists(cache_dir)?;

        let url = remote.as_str();
        let offline = options.local_files_only || self.settings.local_files_only;
        let etag = if offline {
            None
        } else {
            self.probe_etag(remote)?
        };

        if etag.is_none() && !options.force_download {
            if let Some(cached) = find_cached_entry(cache_dir, url)? {
                debug!(
                    target: CACHE_LOG_TARGET,
                    locator = url,
                    path = %cached,
                    "serving cached file without ETag validation"
                );
                return Ok(cached);
            }
        }
        if offline {
            return Err(CacheError::offline_cache_miss(url));
        }

        let cache_path = cache_dir.join(url_to_filename(url, etag.as_deref()));
        if !options.force_download && is_complete(&cache_path) {
            debug!(target: CACHE_LOG_TARGET, locator = url, path = %cache_path, "cache hit");
            return Ok(cache_path);
        }

        debug!(target: CACHE_LOG_TARGET, locator = url, path = %cache_path, "cache miss");
        let user_agent = self.user_agent(options);
        populate_entry(
            &self.transport,
            &PopulateRequest {
                locator: remote,
                cache_path: &cache_path,
                etag: etag.as_deref(),
                force: options.force_download,
                resume: options.resume_download,
                user_agent: &user_agent,
            },
        )?;
        Ok(cache_path)
    }

    /// Probes the `ETag`, degrading HTTP failures to "unknown".
    ///
    /// Object-storage probe failures are fatal so a missing object is
    /// reported rather than silently served from a stale copy.
    fn probe_etag(&self, remote: &RemoteLocator) -> CacheResult<Option<String>> {
        match self.transport.probe_etag(remote, self.settings.etag_timeout) {
            Ok(etag) => Ok(etag),
            Err(err) => match remote {
                RemoteLocator::Http { .. } => {
                    warn!(
                        target: CACHE_LOG_TARGET,
                        locator = %remote,
                        error = %err,
                        "ETag probe failed, falling back to cached copies"
                    );
                    Ok(None)
                }
                RemoteLocator::ObjectStore { .. } => Err(err.into_cache_error(remote.as_str())),
            },
        }
    }

    fn user_agent(&self, options: &ResolveOptions) -> String {
        let configured = self.settings.user_agent.clone().map(UserAgent::Text);
        let extra = options.user_agent.as_ref().or(configured.as_ref());
        user_agent_header(self.settings.backends, extra)
    }
}

fn resolve_local(raw: &str, path: Utf8PathBuf) -> CacheResult<Utf8PathBuf> {
    if path.exists() {
        return Ok(path);
    }
    if has_scheme(raw) {
        return Err(CacheError::invalid_locator(raw, "unsupported URL scheme"));
    }
    Err(CacheError::not_found(raw))
}
