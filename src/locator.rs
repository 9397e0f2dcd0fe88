//! Classifies "path or URL" arguments.
//!
//! Remote locators are dispatched on their scheme: `http`/`https` go through
//! the plain HTTP transport while `s3` locators are split into a bucket and
//! key for the object-storage backend.

use camino::Utf8PathBuf;
use url::Url;

use crate::error::{CacheError, CacheResult};

/// Base location of model files published on the S3 bucket.
const S3_BUCKET_PREFIX: &str = "https://s3.amazonaws.com/models.huggingface.co/bert";
/// Base location of model files served through the CDN.
const CLOUDFRONT_DISTRIB_PREFIX: &str = "https://cdn.huggingface.co";

/// A classified locator.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Locator {
    /// A filesystem path.
    Local(Utf8PathBuf),
    /// A resource fetched through a transport.
    Remote(RemoteLocator),
}

/// Address of a remote resource.
///
/// `raw` keeps the locator exactly as the caller wrote it. It is the cache
/// key and the origin recorded in the sidecar; the parsed `url` is only used
/// to build requests.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RemoteLocator {
    /// An `http://` or `https://` URL.
    Http {
        /// Locator as supplied by the caller.
        raw: String,
        /// Parsed form used for requests.
        url: Url,
    },
    /// An `s3://bucket/key` object-storage URL.
    ObjectStore {
        /// Locator as supplied by the caller.
        raw: String,
        /// Parsed form of `raw`.
        url: Url,
        /// Bucket name taken from the URL host.
        bucket: String,
        /// Object key taken from the URL path, without the leading `/`.
        key: String,
    },
}

impl RemoteLocator {
    /// The locator as written by the caller, used as the cache key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Http { raw, .. } | Self::ObjectStore { raw, .. } => raw,
        }
    }

    /// Parsed URL of the resource.
    #[must_use]
    pub const fn url(&self) -> &Url {
        match self {
            Self::Http { url, .. } | Self::ObjectStore { url, .. } => url,
        }
    }
}

impl std::fmt::Display for RemoteLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Locator {
    /// Classifies `raw` by scheme without touching the filesystem.
    ///
    /// Strings without a recognised remote scheme are treated as local paths;
    /// callers decide whether a missing path is an error.
    ///
    /// # Errors
    ///
    /// Returns [`CacheErrorKind::InvalidLocator`](crate::CacheErrorKind) when
    /// an `s3://` locator lacks its bucket or key.
    ///
    /// # Examples
    ///
    /// ```
    /// use cached_path::{Locator, RemoteLocator};
    ///
    /// let locator = Locator::parse("s3://models/bert/config.json")?;
    /// let Locator::Remote(RemoteLocator::ObjectStore { bucket, key, .. }) = locator else {
    ///     panic!("expected an object-storage locator");
    /// };
    /// assert_eq!(bucket, "models");
    /// assert_eq!(key, "bert/config.json");
    /// # Ok::<(), cached_path::CacheError>(())
    /// ```
    pub fn parse(raw: &str) -> CacheResult<Self> {
        let Ok(url) = Url::parse(raw) else {
            return Ok(Self::Local(Utf8PathBuf::from(raw)));
        };
        match url.scheme() {
            "http" | "https" => Ok(Self::Remote(RemoteLocator::Http {
                raw: raw.to_owned(),
                url,
            })),
            "s3" => split_object_path(raw, url).map(Self::Remote),
            _ => Ok(Self::Local(Utf8PathBuf::from(raw))),
        }
    }
}

fn split_object_path(raw: &str, url: Url) -> CacheResult<RemoteLocator> {
    let bucket = url.host_str().unwrap_or_default().to_owned();
    let key = url.path().trim_start_matches('/').to_owned();
    if bucket.is_empty() || key.is_empty() {
        return Err(CacheError::invalid_locator(
            raw,
            "object-storage locators must look like s3://bucket/key",
        ));
    }
    Ok(RemoteLocator::ObjectStore {
        raw: raw.to_owned(),
        url,
        bucket,
        key,
    })
}

/// Returns `true` when `raw` uses a scheme handled by a remote transport.
#[must_use]
pub fn is_remote_url(raw: &str) -> bool {
    Url::parse(raw).is_ok_and(|url| matches!(url.scheme(), "http" | "https" | "s3"))
}

/// Returns `true` when `raw` carries a URL scheme of any kind.
pub(crate) fn has_scheme(raw: &str) -> bool {
    Url::parse(raw).is_ok()
}

/// Builds the published URL of a model file.
///
/// With `use_cdn` the CDN host is used; otherwise the S3 bucket endpoint.
///
/// # Examples
///
/// ```
/// use cached_path::bucket_url;
///
/// assert_eq!(
///     bucket_url("bert-base-uncased", Some("config.json"), false),
///     "https://s3.amazonaws.com/models.huggingface.co/bert/bert-base-uncased/config.json"
/// );
/// assert_eq!(
///     bucket_url("bert-base-uncased", None, true),
///     "https://cdn.huggingface.co/bert-base-uncased"
/// );
/// ```
#[must_use]
pub fn bucket_url(identifier: &str, postfix: Option<&str>, use_cdn: bool) -> String {
    let endpoint = if use_cdn {
        CLOUDFRONT_DISTRIB_PREFIX
    } else {
        S3_BUCKET_PREFIX
    };
    match postfix {
        Some(file) => format!("{endpoint}/{identifier}/{file}"),
        None => format!("{endpoint}/{identifier}"),
    }
}
