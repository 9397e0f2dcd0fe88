//! Resolving archives with extraction enabled.

use std::fs::{self, File};
use std::io::Write;

use cached_path::test_support::StubTransport;
use cached_path::{
    CacheSettings, RemoteFileCache, ResolveOptions, extraction_dir, url_to_filename,
};
use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::write::GzEncoder;
use rstest::{fixture, rstest};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

const VOCAB: &[u8] = b"[PAD]\n[UNK]\n[CLS]\n";

struct Sandbox {
    _temp: TempDir,
    dir: Utf8PathBuf,
}

#[fixture]
fn sandbox() -> Sandbox {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8 path");
    Sandbox { _temp: temp, dir }
}

fn extract_options() -> ResolveOptions {
    ResolveOptions {
        extract_compressed_file: true,
        ..ResolveOptions::default()
    }
}

fn tar_gz_bytes() -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
    let mut header = tar::Header::new_gnu();
    header.set_size(u64::try_from(VOCAB.len()).expect("length fits"));
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "bert/vocab.txt", VOCAB)
        .expect("append tar entry");
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}

fn write_zip(path: &Utf8Path) {
    let mut writer = zip::ZipWriter::new(File::create(path).expect("create zip"));
    writer
        .start_file("bert/vocab.txt", SimpleFileOptions::default())
        .expect("start zip entry");
    writer.write_all(VOCAB).expect("write zip entry");
    writer.finish().expect("finish zip");
}

#[rstest]
fn remote_archive_is_extracted_next_to_payload(sandbox: Sandbox) {
    let url = "https://example.org/bert-base-uncased.tar.gz";
    let cache = RemoteFileCache::with_transport(
        CacheSettings::with_dir(sandbox.dir.clone()),
        StubTransport::new(tar_gz_bytes()).with_etag("v1"),
    );

    let resolved = cache.resolve(url, &extract_options()).expect("resolve");

    let payload = sandbox.dir.join(url_to_filename(url, Some("v1")));
    assert_eq!(resolved, extraction_dir(&payload));
    assert!(payload.is_file());
    assert_eq!(
        fs::read(resolved.join("bert/vocab.txt")).expect("extracted file"),
        VOCAB
    );
}

#[rstest]
fn local_zip_is_extracted(sandbox: Sandbox) {
    let archive = sandbox.dir.join("bert.zip");
    write_zip(&archive);
    let cache = RemoteFileCache::with_transport(
        CacheSettings::with_dir(sandbox.dir.join("cache")),
        StubTransport::new(Vec::new()),
    );

    let resolved = cache
        .resolve(archive.as_str(), &extract_options())
        .expect("resolve");

    assert_eq!(resolved, sandbox.dir.join("bert-zip-extracted"));
    assert_eq!(
        fs::read(resolved.join("bert/vocab.txt")).expect("extracted file"),
        VOCAB
    );
}

#[rstest]
fn plain_file_is_returned_without_extraction(sandbox: Sandbox) {
    let url = "https://example.org/vocab.txt";
    let cache = RemoteFileCache::with_transport(
        CacheSettings::with_dir(sandbox.dir.clone()),
        StubTransport::new(VOCAB.to_vec()),
    );

    let resolved = cache.resolve(url, &extract_options()).expect("resolve");

    assert_eq!(resolved, sandbox.dir.join(url_to_filename(url, None)));
    assert_eq!(fs::read(&resolved).expect("payload"), VOCAB);
}

#[rstest]
fn archive_is_left_alone_without_extraction(sandbox: Sandbox) {
    let archive = sandbox.dir.join("bert.zip");
    write_zip(&archive);
    let cache = RemoteFileCache::with_transport(
        CacheSettings::with_dir(sandbox.dir.join("cache")),
        StubTransport::new(Vec::new()),
    );

    let resolved = cache
        .resolve(archive.as_str(), &ResolveOptions::default())
        .expect("resolve");

    assert_eq!(resolved, archive);
    assert!(!sandbox.dir.join("bert-zip-extracted").exists());
}
