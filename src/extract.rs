//! Unpacking of downloaded archives beside their cache entry.
//!
//! A payload that turns out to be a zip or (optionally gzip-compressed) tar
//! archive can be expanded into `<name with '.' replaced by '-'>-extracted`
//! next to it. Extraction runs under the entry lock so concurrent callers see
//! either no directory or a complete one.

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::{Context, eyre};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Read};
use tracing::{debug, info};

use crate::cache::CacheLock;
use crate::error::{CacheError, CacheErrorKind, CacheResult};
use crate::observability::CACHE_LOG_TARGET;

/// Bytes inspected when sniffing the archive format.
const HEADER_LEN: u64 = 512;
const ZIP_MAGIC: [&[u8]; 2] = [b"PK\x03\x04", b"PK\x05\x06"];
const GZIP_MAGIC: &[u8] = b"\x1f\x8b";
const TAR_MAGIC: &[u8] = b"ustar";
const TAR_MAGIC_OFFSET: usize = 257;
const EXTRACTED_SUFFIX: &str = "-extracted";

/// Archive formats recognised by [`extract_if_archive`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ArchiveFormat {
    /// A zip archive.
    Zip,
    /// An uncompressed tar archive.
    Tar,
    /// A gzip-compressed tar archive.
    TarGz,
}

/// Sniffs the archive format of `path` from its leading bytes.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn detect_archive(path: &Utf8Path) -> io::Result<Option<ArchiveFormat>> {
    let header = read_header(File::open(path)?)?;
    if ZIP_MAGIC.iter().any(|magic| header.starts_with(magic)) {
        return Ok(Some(ArchiveFormat::Zip));
    }
    if header.starts_with(GZIP_MAGIC) {
        // A corrupt gzip stream is simply not a recognised archive.
        let inflated = read_header(GzDecoder::new(File::open(path)?)).unwrap_or_default();
        return Ok(has_tar_magic(&inflated).then_some(ArchiveFormat::TarGz));
    }
    Ok(has_tar_magic(&header).then_some(ArchiveFormat::Tar))
}

fn read_header(reader: impl Read) -> io::Result<Vec<u8>> {
    let mut header = Vec::new();
    reader.take(HEADER_LEN).read_to_end(&mut header)?;
    Ok(header)
}

fn has_tar_magic(header: &[u8]) -> bool {
    header
        .get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len())
        .is_some_and(|magic| magic == TAR_MAGIC)
}

/// Directory an archive at `cache_path` is extracted into.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use cached_path::extraction_dir;
///
/// assert_eq!(
///     extraction_dir(Utf8Path::new("/cache/abc.def")),
///     Utf8Path::new("/cache/abc-def-extracted")
/// );
/// ```
#[must_use]
pub fn extraction_dir(cache_path: &Utf8Path) -> Utf8PathBuf {
    let name = cache_path.file_name().unwrap_or_default().replace('.', "-");
    cache_path.with_file_name(format!("{name}{EXTRACTED_SUFFIX}"))
}

/// Extracts `cache_path` when it is an archive and returns the directory to
/// hand back to the caller.
///
/// Non-archives are returned unchanged. An existing non-empty extraction is
/// reused unless `force` is set, in which case it is removed and rebuilt.
///
/// # Errors
///
/// Returns [`CacheErrorKind::Extraction`] when the archive cannot be
/// unpacked and [`CacheErrorKind::Other`] for lock or filesystem failures.
pub fn extract_if_archive(cache_path: &Utf8Path, force: bool) -> CacheResult<Utf8PathBuf> {
    let format = detect_archive(cache_path)
        .with_context(|| format!("failed to inspect {cache_path}"))?;
    let Some(archive_format) = format else {
        debug!(target: CACHE_LOG_TARGET, path = %cache_path, "not an archive, skipping extraction");
        return Ok(cache_path.to_path_buf());
    };

    let target = extraction_dir(cache_path);
    if !force && is_populated(&target) {
        debug!(target: CACHE_LOG_TARGET, path = %target, "reusing extracted archive");
        return Ok(target);
    }

    let _lock = CacheLock::acquire(cache_path)
        .with_context(|| format!("failed to lock {cache_path} for extraction"))?;
    if !force && is_populated(&target) {
        return Ok(target);
    }

    match fs::remove_dir_all(&target) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => {
            return Err(CacheError::from(
                eyre!(err).wrap_err(format!("failed to clear {target}")),
            ));
        }
        _ => {}
    }
    fs::create_dir_all(&target).with_context(|| format!("failed to create {target}"))?;

    unpack(cache_path, archive_format, &target).map_err(|report| {
        CacheError::new(
            CacheErrorKind::Extraction,
            report.wrap_err(format!("archive {cache_path} could not be extracted")),
        )
    })?;

    info!(
        target: CACHE_LOG_TARGET,
        archive = %cache_path,
        path = %target,
        format = ?archive_format,
        "extracted archive"
    );
    Ok(target)
}

fn is_populated(dir: &Utf8Path) -> bool {
    fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_some())
}

fn unpack(
    archive: &Utf8Path,
    format: ArchiveFormat,
    target: &Utf8Path,
) -> color_eyre::Result<()> {
    let file = File::open(archive).with_context(|| format!("failed to open {archive}"))?;
    match format {
        ArchiveFormat::Zip => {
            let mut zip = zip::ZipArchive::new(file).context("invalid zip archive")?;
            zip.extract(target).context("failed to unpack zip archive")?;
        }
        ArchiveFormat::Tar => {
            tar::Archive::new(file)
                .unpack(target)
                .context("failed to unpack tar archive")?;
        }
        ArchiveFormat::TarGz => {
            tar::Archive::new(GzDecoder::new(file))
                .unpack(target)
                .context("failed to unpack gzip-compressed tar archive")?;
        }
    }
    Ok(())
}
