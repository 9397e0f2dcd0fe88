//! Cross-process file locking for cache coordination.
//!
//! Each cache entry owns a `<entry>.lock` marker beside its payload so
//! downloads of different entries never wait on each other. On Unix systems
//! the lock is an `flock(2)` advisory lock; on other platforms locking is a
//! no-op.
//!
//! The marker file is left in place after release. Removing it would let a
//! waiter hold a lock on an unlinked inode while a newcomer locks a fresh
//! file.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{File, OpenOptions};
use std::io;
use tracing::debug;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

use super::naming::lock_path;
use crate::observability::CACHE_LOG_TARGET;

/// Guard that holds an exclusive entry lock until dropped.
#[derive(Debug)]
pub struct CacheLock {
    _file: File,
    path: Utf8PathBuf,
}

impl CacheLock {
    /// Acquires the exclusive lock for the entry whose payload lives at
    /// `cache_path`, blocking until it is available.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created or the lock cannot
    /// be acquired.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use camino::Utf8Path;
    /// use cached_path::CacheLock;
    ///
    /// let payload = Utf8Path::new("/tmp/model-cache/3a7bd3e2360a3d29eea436fcfb7e44c7");
    /// let _lock = CacheLock::acquire(payload)?;
    /// // Exclusive access to this entry until `_lock` is dropped.
    /// # Ok::<(), std::io::Error>(())
    /// ```
    pub fn acquire(cache_path: &Utf8Path) -> io::Result<Self> {
        let path = lock_path(cache_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        lock_exclusive(&file, &path)?;
        Ok(Self { _file: file, path })
    }

    /// Path of the lock marker held by this guard.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &File, path: &Utf8Path) -> io::Result<()> {
    if flock(file, libc::LOCK_EX | libc::LOCK_NB).is_ok() {
        return Ok(());
    }

    debug!(
        target: CACHE_LOG_TARGET,
        lock = %path,
        "waiting for cache entry lock"
    );
    retry_interrupted(|| flock(file, libc::LOCK_EX))
}

/// Repeats `operation` while it fails with [`io::ErrorKind::Interrupted`].
#[cfg(unix)]
fn retry_interrupted(mut operation: impl FnMut() -> io::Result<()>) -> io::Result<()> {
    loop {
        match operation() {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            outcome => return outcome,
        }
    }
}

#[cfg(unix)]
fn flock(file: &File, operation: libc::c_int) -> io::Result<()> {
    // SAFETY: The file descriptor obtained from `file.as_raw_fd()` is valid
    // because `file` is borrowed for the duration of this call and stays
    // open until the owning `CacheLock` is dropped.
    let result = unsafe { libc::flock(file.as_raw_fd(), operation) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// No-op lock acquisition on non-Unix platforms.
#[cfg(not(unix))]
fn lock_exclusive(_file: &File, path: &Utf8Path) -> io::Result<()> {
    // Cross-process locking not supported; concurrent downloads of the same
    // entry may race here.
    tracing::warn!(
        target: CACHE_LOG_TARGET,
        lock = %path,
        "cache entry locking is not supported on this platform"
    );
    Ok(())
}
