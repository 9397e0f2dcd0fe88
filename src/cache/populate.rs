//! Downloading a remote resource into its cache entry.
//!
//! Population runs under the entry lock and re-checks the payload after the
//! lock is granted, so a caller that waited on another process's download
//! reuses it instead of fetching again. Bytes land in a staging file first;
//! the payload path only ever holds a complete download.

use camino::Utf8Path;
use color_eyre::eyre::{Context, eyre};
use std::fs::{self, OpenOptions};
use std::io::Write;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::lock::CacheLock;
use super::metadata::{CacheMetadata, is_complete, write_metadata};
use super::naming::incomplete_path;
use crate::error::{CacheError, CacheResult};
use crate::locator::RemoteLocator;
use crate::observability::CACHE_LOG_TARGET;
use crate::progress::{DownloadProgress, copy_with_progress};
use crate::transport::{Download, DownloadRequest, Fetched, Transport, TransportError};

/// Everything needed to populate one cache entry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PopulateRequest<'a> {
    pub(crate) locator: &'a RemoteLocator,
    pub(crate) cache_path: &'a Utf8Path,
    pub(crate) etag: Option<&'a str>,
    pub(crate) force: bool,
    pub(crate) resume: bool,
    pub(crate) user_agent: &'a str,
}

impl PopulateRequest<'_> {
    fn metadata(&self) -> CacheMetadata {
        CacheMetadata {
            url: self.locator.as_str().to_owned(),
            etag: self.etag.map(str::to_owned),
        }
    }
}

/// Downloads `request.locator` into `request.cache_path` unless another
/// writer completed it while this caller waited for the lock.
pub(crate) fn populate_entry<T>(transport: &T, request: &PopulateRequest<'_>) -> CacheResult<()>
where
    T: Transport + ?Sized,
{
    let cache_path = request.cache_path;
    let _lock = CacheLock::acquire(cache_path)
        .with_context(|| format!("failed to lock cache entry {cache_path}"))?;

    if !request.force && cache_path.is_file() {
        if is_complete(cache_path) {
            debug!(
                target: CACHE_LOG_TARGET,
                path = %cache_path,
                "cache entry populated by another writer"
            );
        } else {
            // Payloads only reach this path complete; the writer stopped
            // before recording the sidecar.
            warn!(
                target: CACHE_LOG_TARGET,
                path = %cache_path,
                "restoring missing cache metadata"
            );
            write_metadata(cache_path, &request.metadata())?;
        }
        return Ok(());
    }

    info!(
        target: CACHE_LOG_TARGET,
        locator = %request.locator,
        path = %cache_path,
        resume = request.resume,
        "downloading into cache"
    );

    if request.resume {
        download_resumable(transport, request)?;
    } else {
        download_to_temp(transport, request)?;
    }

    write_metadata(cache_path, &request.metadata())?;

    info!(
        target: CACHE_LOG_TARGET,
        locator = %request.locator,
        path = %cache_path,
        "stored cache entry"
    );
    Ok(())
}

fn fetch<T>(transport: &T, request: &PopulateRequest<'_>, resume_from: u64) -> CacheResult<Fetched>
where
    T: Transport + ?Sized,
{
    let download = DownloadRequest {
        resume_from,
        user_agent: request.user_agent,
    };
    transport
        .open(request.locator, &download)
        .map_err(|err| err.into_cache_error(request.locator.as_str()))
}

/// Streams into `<payload>.incomplete`, continuing from its current length.
fn download_resumable<T>(transport: &T, request: &PopulateRequest<'_>) -> CacheResult<()>
where
    T: Transport + ?Sized,
{
    let cache_path = request.cache_path;
    let staging = incomplete_path(cache_path);
    let resume_from = fs::metadata(&staging).map_or(0, |meta| meta.len());

    match fetch(transport, request, resume_from)? {
        Fetched::AlreadyComplete => {
            debug!(
                target: CACHE_LOG_TARGET,
                path = %staging,
                bytes = resume_from,
                "staging file already complete"
            );
        }
        Fetched::Body(mut download) => {
            let mut options = OpenOptions::new();
            options.create(true);
            let initial = if download.resumed {
                options.append(true);
                resume_from
            } else {
                if resume_from > 0 {
                    debug!(
                        target: CACHE_LOG_TARGET,
                        path = %staging,
                        "server ignored range request, restarting download"
                    );
                }
                options.write(true).truncate(true);
                0
            };
            let mut file = options
                .open(&staging)
                .with_context(|| format!("failed to open staging file {staging}"))?;
            stream_body(request, &mut download, initial, &mut file)?;
            file.sync_all()
                .with_context(|| format!("failed to flush staging file {staging}"))?;
        }
    }

    fs::rename(&staging, cache_path)
        .with_context(|| format!("failed to move {staging} into place"))?;
    Ok(())
}

/// Streams into an anonymous temporary file in the cache directory.
fn download_to_temp<T>(transport: &T, request: &PopulateRequest<'_>) -> CacheResult<()>
where
    T: Transport + ?Sized,
{
    let cache_path = request.cache_path;
    let Fetched::Body(mut download) = fetch(transport, request, 0)? else {
        return Err(CacheError::from(eyre!(
            "{} reported an unsatisfiable range for a full download",
            request.locator
        )));
    };

    let dir = cache_path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let mut staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temporary file in {dir}"))?;
    stream_body(request, &mut download, 0, staged.as_file_mut())?;
    staged
        .as_file()
        .sync_all()
        .with_context(|| format!("failed to flush download of {}", request.locator))?;
    staged
        .persist(cache_path)
        .with_context(|| format!("failed to move download into {cache_path}"))?;
    Ok(())
}

fn stream_body(
    request: &PopulateRequest<'_>,
    download: &mut Download,
    initial: u64,
    sink: &mut dyn Write,
) -> CacheResult<()> {
    let locator = request.locator.as_str();
    let mut progress = DownloadProgress::new(locator, initial, download.remaining_len);
    copy_with_progress(download.body.as_mut(), sink, &mut progress)
        .map_err(|err| TransportError::Io(err).into_cache_error(locator))?;
    Ok(())
}
