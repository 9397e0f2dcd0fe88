//! Network access behind a narrow, swappable seam.
//!
//! The cache never talks to the network directly. It asks a [`Transport`] for
//! the current `ETag` of a resource and for a streamed body, optionally
//! starting at a byte offset. [`HttpTransport`] is the production
//! implementation; tests substitute an in-memory transport.

mod http;
mod user_agent;

pub use http::HttpTransport;
pub use user_agent::{UserAgent, user_agent_header};

use color_eyre::Report;
use std::io::{self, Read};
use std::time::Duration;
use thiserror::Error;

use crate::error::{CacheError, CacheErrorKind};
use crate::locator::RemoteLocator;

/// Parameters of a body request.
#[derive(Debug, Clone, Copy)]
pub struct DownloadRequest<'a> {
    /// Byte offset to resume from; `0` requests the whole body.
    pub resume_from: u64,
    /// Value sent in the `User-Agent` header.
    pub user_agent: &'a str,
}

/// A streamed response body.
pub struct Download {
    /// Reader yielding the body bytes.
    pub body: Box<dyn Read + Send>,
    /// Number of bytes the body will yield, when advertised.
    pub remaining_len: Option<u64>,
    /// `true` when the body starts at the requested offset; `false` when the
    /// server ignored the range and sent the full resource.
    pub resumed: bool,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("remaining_len", &self.remaining_len)
            .field("resumed", &self.resumed)
            .finish_non_exhaustive()
    }
}

/// Outcome of opening a body.
#[derive(Debug)]
pub enum Fetched {
    /// The server is sending bytes.
    Body(Download),
    /// The server rejected the range as unsatisfiable: everything up to
    /// `resume_from` is already the complete resource.
    AlreadyComplete,
}

/// Failures reported by a [`Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The resource does not exist.
    #[error("resource not found")]
    NotFound,
    /// The request exceeded its time limit.
    #[error("request timed out")]
    Timeout,
    /// The server answered with a status the transport cannot use.
    #[error("unexpected response status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },
    /// The HTTP client failed before a response was received.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// Local or stream I/O failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Converts the failure into a cache error naming `locator`.
    ///
    /// [`TransportError::NotFound`] becomes
    /// [`CacheErrorKind::NotFound`]; everything else is reported as
    /// [`CacheErrorKind::Transport`] with the original error kept as the
    /// source.
    #[must_use]
    pub fn into_cache_error(self, locator: &str) -> CacheError {
        match self {
            Self::NotFound => CacheError::not_found(locator),
            other => CacheError::new(
                CacheErrorKind::Transport,
                Report::new(other).wrap_err(format!("failed to fetch {locator}")),
            ),
        }
    }
}

/// Source of remote resources.
pub trait Transport: Send + Sync {
    /// Retrieves the current `ETag` of `locator` within `timeout`.
    ///
    /// Returns `Ok(None)` when the server answers without an `ETag`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the probe fails. Callers decide whether
    /// the failure is fatal for the locator's backend.
    fn probe_etag(
        &self,
        locator: &RemoteLocator,
        timeout: Duration,
    ) -> Result<Option<String>, TransportError>;

    /// Opens the body of `locator`, honouring [`DownloadRequest::resume_from`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotFound`] for missing resources and other
    /// variants for failed requests.
    fn open(
        &self,
        locator: &RemoteLocator,
        request: &DownloadRequest<'_>,
    ) -> Result<Fetched, TransportError>;
}
