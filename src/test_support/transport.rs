//! In-memory [`Transport`] for exercising cache flows without a network.

use std::io::{self, Cursor, Read};
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crate::locator::RemoteLocator;
use crate::transport::{Download, DownloadRequest, Fetched, Transport, TransportError};

/// Serves a fixed body and records how it was asked for.
///
/// # Examples
/// ```
/// use cached_path::test_support::StubTransport;
///
/// let transport = StubTransport::new(b"weights".to_vec()).with_etag("v1");
/// assert_eq!(transport.open_calls(), 0);
/// ```
#[derive(Debug, Default)]
pub struct StubTransport {
    body: Vec<u8>,
    etag: Option<String>,
    missing: bool,
    probe_fails: bool,
    ignores_ranges: bool,
    interrupt_after: Option<usize>,
    delay: Duration,
    probe_calls: AtomicUsize,
    open_calls: AtomicUsize,
    last_resume_from: Mutex<Option<u64>>,
    last_user_agent: Mutex<Option<String>>,
}

impl StubTransport {
    /// Serves `body` without an `ETag`.
    #[must_use]
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }

    /// Reports `etag` from the probe.
    #[must_use]
    pub fn with_etag(mut self, etag: &str) -> Self {
        self.etag = Some(etag.to_owned());
        self
    }

    /// Answers every request with "not found".
    #[must_use]
    pub const fn missing(mut self) -> Self {
        self.missing = true;
        self
    }

    /// Fails every probe with a timeout.
    #[must_use]
    pub const fn failing_probe(mut self) -> Self {
        self.probe_fails = true;
        self
    }

    /// Sends the full body even when a range is requested.
    #[must_use]
    pub const fn ignoring_ranges(mut self) -> Self {
        self.ignores_ranges = true;
        self
    }

    /// Breaks the connection after `bytes` bytes of every body.
    #[must_use]
    pub const fn interrupt_after(mut self, bytes: usize) -> Self {
        self.interrupt_after = Some(bytes);
        self
    }

    /// Sleeps for `delay` before answering each body request.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of `ETag` probes served.
    #[must_use]
    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    /// Number of body requests served.
    #[must_use]
    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// Offset requested by the most recent body request.
    #[must_use]
    pub fn last_resume_from(&self) -> Option<u64> {
        *self
            .last_resume_from
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// `User-Agent` sent with the most recent body request.
    #[must_use]
    pub fn last_user_agent(&self) -> Option<String> {
        self.last_user_agent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, request: &DownloadRequest<'_>) {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_resume_from
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request.resume_from);
        *self
            .last_user_agent
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request.user_agent.to_owned());
    }
}

/// Reader that fails as a dropped connection would.
struct BrokenConnection;

impl Read for BrokenConnection {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by stub transport",
        ))
    }
}

impl Transport for StubTransport {
    fn probe_etag(
        &self,
        _locator: &RemoteLocator,
        _timeout: Duration,
    ) -> Result<Option<String>, TransportError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.missing {
            return Err(TransportError::NotFound);
        }
        if self.probe_fails {
            return Err(TransportError::Timeout);
        }
        Ok(self.etag.clone())
    }

    fn open(
        &self,
        _locator: &RemoteLocator,
        request: &DownloadRequest<'_>,
    ) -> Result<Fetched, TransportError> {
        self.record(request);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.missing {
            return Err(TransportError::NotFound);
        }

        let honours_range = request.resume_from > 0 && !self.ignores_ranges;
        let start = if honours_range {
            usize::try_from(request.resume_from).unwrap_or(usize::MAX)
        } else {
            0
        };
        if honours_range && start >= self.body.len() {
            return Ok(Fetched::AlreadyComplete);
        }

        let remaining = self.body.get(start..).unwrap_or_default().to_vec();
        let remaining_len = u64::try_from(remaining.len()).ok();
        let body: Box<dyn Read + Send> = match self.interrupt_after {
            Some(limit) if limit < remaining.len() => {
                let prefix = remaining.get(..limit).unwrap_or_default().to_vec();
                Box::new(Cursor::new(prefix).chain(BrokenConnection))
            }
            _ => Box::new(Cursor::new(remaining)),
        };

        Ok(Fetched::Body(Download {
            body,
            remaining_len,
            resumed: honours_range,
        }))
    }
}
