//! Domain error types for the remote file cache.

use color_eyre::Report;
use thiserror::Error;

/// Result alias for operations that may return a [`CachedPathError`].
pub type Result<T> = std::result::Result<T, CachedPathError>;

/// Result alias for cache-specific fallible operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Result alias for configuration fallible operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level error exposed by the crate.
#[derive(Debug, Error)]
pub enum CachedPathError {
    /// Indicates resolving or populating a cache entry failed.
    #[error("cache operation failed")]
    Cache(#[from] CacheError),
    /// Indicates configuration parsing failed.
    #[error("configuration parsing failed")]
    Config(#[from] ConfigError),
}

/// Categorises cache failures so callers can branch on structured errors.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum CacheErrorKind {
    /// Represents errors without a more specific semantic meaning, such as
    /// I/O failures inside the cache directory.
    #[default]
    Other,
    /// A local path, remote resource, or cache entry does not exist.
    NotFound,
    /// A locator could not be parsed into the address components its backend
    /// requires.
    InvalidLocator,
    /// The transport failed for a reason other than "not found".
    Transport,
    /// No cached copy exists and network access was disabled.
    OfflineCacheMiss,
    /// A downloaded archive could not be extracted.
    Extraction,
}

/// Captures cache-specific failures.
#[derive(Debug, Error)]
#[error("{report}")]
pub struct CacheError {
    kind: CacheErrorKind,
    #[source]
    report: Report,
}

impl CacheError {
    /// Constructs a new cache error with the provided kind and diagnostic
    /// report.
    #[must_use]
    pub const fn new(kind: CacheErrorKind, report: Report) -> Self {
        Self { kind, report }
    }

    /// Builds a [`CacheErrorKind::NotFound`] error naming the missing locator.
    #[must_use]
    pub fn not_found(locator: &str) -> Self {
        Self::new(
            CacheErrorKind::NotFound,
            color_eyre::eyre::eyre!("file {locator} not found"),
        )
    }

    /// Builds a [`CacheErrorKind::InvalidLocator`] error.
    #[must_use]
    pub fn invalid_locator(locator: &str, reason: &str) -> Self {
        Self::new(
            CacheErrorKind::InvalidLocator,
            color_eyre::eyre::eyre!("unable to parse {locator} as a URL or as a local path: {reason}"),
        )
    }

    /// Builds a [`CacheErrorKind::OfflineCacheMiss`] error.
    #[must_use]
    pub fn offline_cache_miss(locator: &str) -> Self {
        Self::new(
            CacheErrorKind::OfflineCacheMiss,
            color_eyre::eyre::eyre!(
                "cannot find {locator} in the cached path and outgoing traffic has been disabled"
            ),
        )
    }

    /// Returns the semantic category for this cache failure.
    #[must_use]
    pub const fn kind(&self) -> CacheErrorKind {
        self.kind
    }

    /// Extracts the underlying diagnostic report.
    pub fn into_report(self) -> Report {
        self.report
    }
}

impl From<Report> for CacheError {
    fn from(report: Report) -> Self {
        Self::new(CacheErrorKind::Other, report)
    }
}

impl From<ConfigError> for CacheError {
    fn from(err: ConfigError) -> Self {
        let ConfigError(report) = err;
        Self::new(CacheErrorKind::Other, report)
    }
}

impl From<CachedPathError> for CacheError {
    fn from(err: CachedPathError) -> Self {
        match err {
            CachedPathError::Cache(inner) => inner,
            CachedPathError::Config(inner) => inner.into(),
        }
    }
}

/// Captures configuration failures.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ConfigError(#[from] Report);
