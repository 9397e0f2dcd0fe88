//! Download progress reporting through `tracing` events.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::observability::CACHE_LOG_TARGET;

/// Copy buffer size.
const CHUNK_SIZE: usize = 64 * 1024;
/// Minimum spacing between progress events.
const REPORT_INTERVAL: Duration = Duration::from_secs(2);

/// Tracks bytes written for one download and logs periodic progress.
#[derive(Debug)]
pub(crate) struct DownloadProgress<'a> {
    locator: &'a str,
    written: u64,
    total: Option<u64>,
    started: Instant,
    last_report: Instant,
}

impl<'a> DownloadProgress<'a> {
    /// Starts tracking a body of `remaining` bytes appended after `initial`
    /// bytes already on disk.
    pub(crate) fn new(locator: &'a str, initial: u64, remaining: Option<u64>) -> Self {
        let now = Instant::now();
        Self {
            locator,
            written: initial,
            total: remaining.map(|len| initial.saturating_add(len)),
            started: now,
            last_report: now,
        }
    }

    fn percent(&self) -> Option<u64> {
        self.total
            .and_then(|total| self.written.saturating_mul(100).checked_div(total))
    }

    pub(crate) fn advance(&mut self, bytes: u64) {
        self.written = self.written.saturating_add(bytes);
        if self.last_report.elapsed() < REPORT_INTERVAL {
            return;
        }
        self.last_report = Instant::now();
        debug!(
            target: CACHE_LOG_TARGET,
            locator = self.locator,
            written = self.written,
            total = ?self.total,
            percent = ?self.percent(),
            "download in progress"
        );
    }

    pub(crate) fn finish(&self) {
        info!(
            target: CACHE_LOG_TARGET,
            locator = self.locator,
            bytes = self.written,
            elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "download finished"
        );
    }
}

/// Streams `reader` into `writer`, feeding `progress` after every chunk.
pub(crate) fn copy_with_progress(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    progress: &mut DownloadProgress<'_>,
) -> io::Result<u64> {
    let mut buffer = vec![0_u8; CHUNK_SIZE];
    let mut copied = 0_u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        let chunk = buffer.get(..read).unwrap_or_default();
        writer.write_all(chunk)?;
        let advanced = u64::try_from(read).unwrap_or(u64::MAX);
        copied = copied.saturating_add(advanced);
        progress.advance(advanced);
    }
    writer.flush()?;
    progress.finish();
    Ok(copied)
}
