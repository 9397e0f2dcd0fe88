//! Minimal loopback HTTP/1.1 server for transport tests.
//!
//! Each connection carries one request and is closed after the response, so
//! the handler sees requests in the order the client issued them.

use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// A parsed request line and header block.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method, e.g. `HEAD`.
    pub method: String,
    /// Request target, e.g. `/bucket/key`.
    pub path: String,
    /// Header values keyed by lowercase name.
    pub headers: BTreeMap<String, String>,
}

impl Request {
    /// Looks up a header by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// A canned response.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    reason: &'static str,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    /// Builds a response with `status` and an empty body.
    pub fn status(status: u16, reason: &'static str) -> Self {
        Self {
            status,
            reason,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// `200 OK` carrying `body`.
    pub fn ok(body: &[u8]) -> Self {
        Self::status(200, "OK").with_body(body)
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: &[u8]) -> Self {
        self.body = body.to_vec();
        self
    }

    fn write_to(&self, stream: &mut TcpStream, include_body: bool) -> io::Result<()> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, self.reason);
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n",
            self.body.len()
        ));
        stream.write_all(head.as_bytes())?;
        if include_body {
            stream.write_all(&self.body)?;
        }
        stream.flush()
    }
}

/// Handle to a running server.
pub struct TestServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl TestServer {
    /// Binds a loopback port and serves up to `max_requests` requests with
    /// `handler`. Returns `None` when the sandbox forbids binding.
    pub fn spawn<F>(max_requests: usize, handler: F) -> Option<Self>
    where
        F: Fn(&Request) -> Response + Send + 'static,
    {
        let listener = match TcpListener::bind("127.0.0.1:0") {
            Ok(listener) => listener,
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                eprintln!("skipping: cannot bind localhost in this environment: {err}");
                return None;
            }
            Err(err) => panic!("bind loopback listener: {err}"),
        };
        let addr = listener.local_addr().expect("listener address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        thread::spawn(move || {
            for stream in listener.incoming().take(max_requests) {
                let Ok(mut stream) = stream else { break };
                let Some(request) = read_request(&stream) else {
                    continue;
                };
                let response = handler(&request);
                let include_body = request.method != "HEAD";
                recorded
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(request);
                let _ = response.write_to(&mut stream, include_body);
            }
        });

        Some(Self { addr, requests })
    }

    /// Absolute URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Requests served so far.
    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Wraps `handler` so `HEAD` requests are answered only after `delay`.
///
/// The server is single-threaded, so later requests queue behind the delay.
pub fn slow_head<F>(delay: Duration, handler: F) -> impl Fn(&Request) -> Response + Send + 'static
where
    F: Fn(&Request) -> Response + Send + 'static,
{
    move |request| {
        if request.method == "HEAD" {
            thread::sleep(delay);
        }
        handler(request)
    }
}

fn read_request(stream: &TcpStream) -> Option<Request> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_owned();
    let path = parts.next()?.to_owned();

    let mut headers = BTreeMap::new();
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).ok()? == 0 {
            break;
        }
        let trimmed = header.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_owned());
        }
    }
    Some(Request {
        method,
        path,
        headers,
    })
}
