//! Blocking HTTP transport.
//!
//! `http(s)://` locators are requested as-is. `s3://bucket/key` locators are
//! addressed path-style against the configured object-storage endpoint, i.e.
//! `GET {endpoint}/{bucket}/{key}`, without request signing.

use color_eyre::eyre::Context;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ETAG, RANGE, USER_AGENT};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{Download, DownloadRequest, Fetched, Transport, TransportError};
use crate::cache::CacheSettings;
use crate::error::CacheResult;
use crate::locator::RemoteLocator;
use crate::observability::TRANSPORT_LOG_TARGET;

/// [`Transport`] backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    object_store_endpoint: Url,
}

impl HttpTransport {
    /// Builds a transport honouring the proxy and object-storage endpoint in
    /// `settings`.
    ///
    /// Body downloads are not time-limited; only the `ETag` probe carries a
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the proxy URL is invalid or the HTTP client
    /// cannot be initialised.
    pub fn new(settings: &CacheSettings) -> CacheResult<Self> {
        let mut builder = Client::builder().timeout(Option::<Duration>::None);
        if let Some(proxy_url) = settings.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url)
                .with_context(|| format!("invalid proxy URL: {proxy_url}"))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .context("failed to initialise the HTTP client")?;
        Ok(Self {
            client,
            object_store_endpoint: settings.object_store_endpoint.clone(),
        })
    }

    /// URL actually requested for `locator`.
    fn request_url(&self, locator: &RemoteLocator) -> String {
        match locator {
            RemoteLocator::Http { url, .. } => url.as_str().to_owned(),
            RemoteLocator::ObjectStore { bucket, key, .. } => format!(
                "{}/{bucket}/{key}",
                self.object_store_endpoint.as_str().trim_end_matches('/')
            ),
        }
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Http(err)
    }
}

impl Transport for HttpTransport {
    fn probe_etag(
        &self,
        locator: &RemoteLocator,
        timeout: Duration,
    ) -> Result<Option<String>, TransportError> {
        let url = self.request_url(locator);
        debug!(target: TRANSPORT_LOG_TARGET, url = %url, ?timeout, "probing ETag");

        let response = self
            .client
            .head(url)
            .timeout(timeout)
            .send()
            .map_err(classify)?;

        match response.status() {
            StatusCode::OK => Ok(response
                .headers()
                .get(ETAG)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)),
            StatusCode::NOT_FOUND => Err(TransportError::NotFound),
            status => Err(TransportError::Status {
                status: status.as_u16(),
            }),
        }
    }

    fn open(
        &self,
        locator: &RemoteLocator,
        request: &DownloadRequest<'_>,
    ) -> Result<Fetched, TransportError> {
        let url = self.request_url(locator);
        debug!(
            target: TRANSPORT_LOG_TARGET,
            url = %url,
            resume_from = request.resume_from,
            "opening download"
        );

        let mut builder = self.client.get(url).header(USER_AGENT, request.user_agent);
        if request.resume_from > 0 {
            builder = builder.header(RANGE, format!("bytes={}-", request.resume_from));
        }
        let response = builder.send().map_err(classify)?;

        match response.status() {
            StatusCode::RANGE_NOT_SATISFIABLE if request.resume_from > 0 => {
                Ok(Fetched::AlreadyComplete)
            }
            status @ (StatusCode::OK | StatusCode::PARTIAL_CONTENT) => {
                let resumed = status == StatusCode::PARTIAL_CONTENT && request.resume_from > 0;
                let remaining_len = response.content_length();
                Ok(Fetched::Body(Download {
                    body: Box::new(response),
                    remaining_len,
                    resumed,
                }))
            }
            StatusCode::NOT_FOUND => Err(TransportError::NotFound),
            status => Err(TransportError::Status {
                status: status.as_u16(),
            }),
        }
    }
}
