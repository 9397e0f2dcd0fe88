//! Exercises the blocking HTTP transport against a loopback server.

use std::io::Read;
use std::time::{Duration, Instant};

use cached_path::{
    CacheSettings, Download, DownloadRequest, Fetched, HttpTransport, Locator, RemoteFileCache,
    RemoteLocator, ResolveOptions, Transport, TransportError, lookup_metadata, url_to_filename,
};
use camino::Utf8PathBuf;
use rstest::rstest;
use tempfile::tempdir;
use url::Url;

#[path = "support/http_server.rs"]
mod http_server;

use http_server::{Request, Response, TestServer, slow_head};

const BODY: &[u8] = b"0123456789abcdef";
const TIMEOUT: Duration = Duration::from_secs(5);

fn remote(raw: &str) -> RemoteLocator {
    match Locator::parse(raw).expect("parse locator") {
        Locator::Remote(remote) => remote,
        Locator::Local(path) => panic!("expected remote locator, got {path}"),
    }
}

fn settings_for(server: &TestServer) -> (tempfile::TempDir, CacheSettings) {
    let temp = tempdir().expect("tempdir");
    let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8 path");
    let mut settings = CacheSettings::with_dir(dir);
    settings.object_store_endpoint = Url::parse(&server.base_url()).expect("endpoint");
    (temp, settings)
}

fn request(resume_from: u64) -> DownloadRequest<'static> {
    DownloadRequest {
        resume_from,
        user_agent: "cached-path/test",
    }
}

fn read_body(fetched: Fetched) -> (Vec<u8>, Download) {
    let Fetched::Body(mut download) = fetched else {
        panic!("expected a body");
    };
    let mut body = Vec::new();
    download.body.read_to_end(&mut body).expect("read body");
    (body, download)
}

/// Serves `BODY`, honouring `Range: bytes=N-`.
fn ranged(request: &Request) -> Response {
    let etag = "\"v1\"";
    if request.method == "HEAD" {
        return Response::ok(BODY).with_header("ETag", etag);
    }
    let Some(range) = request.header("range") else {
        return Response::ok(BODY).with_header("ETag", etag);
    };
    let start: usize = range
        .trim_start_matches("bytes=")
        .trim_end_matches('-')
        .parse()
        .expect("numeric range start");
    if start >= BODY.len() {
        return Response::status(416, "Range Not Satisfiable");
    }
    Response::status(206, "Partial Content")
        .with_header(
            "Content-Range",
            &format!("bytes {start}-{}/{}", BODY.len() - 1, BODY.len()),
        )
        .with_body(&BODY[start..])
}

#[rstest]
fn probe_reads_etag_from_head() {
    let Some(server) = TestServer::spawn(1, ranged) else {
        return;
    };
    let (_temp, settings) = settings_for(&server);
    let transport = HttpTransport::new(&settings).expect("transport");

    let etag = transport
        .probe_etag(&remote(&server.url("/model.bin")), TIMEOUT)
        .expect("probe");

    assert_eq!(etag.as_deref(), Some("\"v1\""));
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "HEAD");
}

#[rstest]
#[case(404, "Not Found")]
#[case(500, "Internal Server Error")]
fn probe_reports_failures(#[case] status: u16, #[case] reason: &'static str) {
    let Some(server) = TestServer::spawn(1, move |_| Response::status(status, reason)) else {
        return;
    };
    let (_temp, settings) = settings_for(&server);
    let transport = HttpTransport::new(&settings).expect("transport");

    let err = transport
        .probe_etag(&remote(&server.url("/missing.bin")), TIMEOUT)
        .expect_err("probe fails");

    match (status, err) {
        (404, TransportError::NotFound) => {}
        (500, TransportError::Status { status: 500 }) => {}
        (_, other) => panic!("unexpected probe error: {other:?}"),
    }
}

#[rstest]
fn slow_etag_request_times_out() {
    let Some(server) = TestServer::spawn(1, slow_head(Duration::from_secs(2), ranged)) else {
        return;
    };
    let (_temp, settings) = settings_for(&server);
    let transport = HttpTransport::new(&settings).expect("transport");

    let started = Instant::now();
    let err = transport
        .probe_etag(
            &remote(&server.url("/model.bin")),
            Duration::from_millis(200),
        )
        .expect_err("probe exceeds its timeout");

    assert!(
        matches!(err, TransportError::Timeout),
        "unexpected error: {err:?}"
    );
    assert!(started.elapsed() < Duration::from_millis(1500));
}

#[rstest]
fn resolve_without_timely_etag_uses_unversioned_name() {
    let Some(server) = TestServer::spawn(2, slow_head(Duration::from_secs(1), ranged)) else {
        return;
    };
    let (_temp, mut settings) = settings_for(&server);
    settings.etag_timeout = Duration::from_millis(200);
    let cache_dir = settings.cache_dir.clone();
    let cache = RemoteFileCache::new(settings).expect("cache");
    let url = server.url("/model.bin");

    let path = cache
        .resolve(&url, &ResolveOptions::default())
        .expect("resolve despite probe timeout");

    let filename = url_to_filename(&url, None);
    assert_eq!(path, cache_dir.join(&filename));
    assert_eq!(std::fs::read(&path).expect("payload"), BODY);
    let metadata = lookup_metadata(&filename, &cache_dir).expect("metadata");
    assert_eq!(metadata.etag, None);
}

#[rstest]
fn full_download_sends_user_agent() {
    let Some(server) = TestServer::spawn(1, ranged) else {
        return;
    };
    let (_temp, settings) = settings_for(&server);
    let transport = HttpTransport::new(&settings).expect("transport");

    let fetched = transport
        .open(&remote(&server.url("/model.bin")), &request(0))
        .expect("open");
    let (body, download) = read_body(fetched);

    assert_eq!(body, BODY);
    assert!(!download.resumed);
    assert_eq!(download.remaining_len, Some(16));
    let requests = server.requests();
    assert_eq!(requests[0].header("user-agent"), Some("cached-path/test"));
    assert_eq!(requests[0].header("range"), None);
}

#[rstest]
fn ranged_download_resumes_from_offset() {
    let Some(server) = TestServer::spawn(1, ranged) else {
        return;
    };
    let (_temp, settings) = settings_for(&server);
    let transport = HttpTransport::new(&settings).expect("transport");

    let fetched = transport
        .open(&remote(&server.url("/model.bin")), &request(10))
        .expect("open");
    let (body, download) = read_body(fetched);

    assert_eq!(body, b"abcdef");
    assert!(download.resumed);
    assert_eq!(server.requests()[0].header("range"), Some("bytes=10-"));
}

#[rstest]
fn unsatisfiable_range_means_complete() {
    let Some(server) = TestServer::spawn(1, ranged) else {
        return;
    };
    let (_temp, settings) = settings_for(&server);
    let transport = HttpTransport::new(&settings).expect("transport");

    let fetched = transport
        .open(&remote(&server.url("/model.bin")), &request(16))
        .expect("open");

    assert!(matches!(fetched, Fetched::AlreadyComplete));
}

#[rstest]
fn server_ignoring_range_restarts_body() {
    let Some(server) = TestServer::spawn(1, |_| Response::ok(BODY)) else {
        return;
    };
    let (_temp, settings) = settings_for(&server);
    let transport = HttpTransport::new(&settings).expect("transport");

    let fetched = transport
        .open(&remote(&server.url("/model.bin")), &request(4))
        .expect("open");
    let (body, download) = read_body(fetched);

    assert_eq!(body, BODY);
    assert!(!download.resumed);
}

#[rstest]
fn object_store_requests_are_path_style() {
    let Some(server) = TestServer::spawn(2, ranged) else {
        return;
    };
    let (_temp, settings) = settings_for(&server);
    let transport = HttpTransport::new(&settings).expect("transport");
    let locator = remote("s3://models/bert/config.json");

    transport.probe_etag(&locator, TIMEOUT).expect("probe");
    read_body(transport.open(&locator, &request(0)).expect("open"));

    let paths: Vec<String> = server
        .requests()
        .into_iter()
        .map(|request| request.path)
        .collect();
    assert_eq!(paths, ["/models/bert/config.json", "/models/bert/config.json"]);
}

#[rstest]
fn resolve_downloads_and_records_metadata() {
    let Some(server) = TestServer::spawn(2, ranged) else {
        return;
    };
    let (_temp, settings) = settings_for(&server);
    let cache_dir = settings.cache_dir.clone();
    let cache = RemoteFileCache::new(settings).expect("cache");
    let url = server.url("/bert/config.json");

    let path = cache
        .resolve(&url, &ResolveOptions::default())
        .expect("resolve");

    let filename = url_to_filename(&url, Some("\"v1\""));
    assert_eq!(path, cache_dir.join(&filename));
    assert_eq!(std::fs::read(&path).expect("payload"), BODY);
    let metadata = lookup_metadata(&filename, &cache_dir).expect("metadata");
    assert_eq!(metadata.url, url);
    assert_eq!(metadata.etag.as_deref(), Some("\"v1\""));
}

#[rstest]
fn missing_remote_file_is_not_found() {
    let Some(server) = TestServer::spawn(2, |_| Response::status(404, "Not Found")) else {
        return;
    };
    let (_temp, settings) = settings_for(&server);
    let cache = RemoteFileCache::new(settings).expect("cache");
    let url = server.url("/absent.bin");

    let err = cache
        .resolve(&url, &ResolveOptions::default())
        .expect_err("missing file");

    assert_eq!(err.kind(), cached_path::CacheErrorKind::NotFound);
    assert!(err.to_string().contains(&url));
}
