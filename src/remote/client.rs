//! HTTP client for the listing API and file content.
//!
//! This module provides [`RemoteClient`], which lists directories with a
//! built-in retry loop, and opens file bodies as [`FileStream`]s that the
//! caller copies to disk. Transfers are not retried here: a failed stream is
//! surfaced to the caller so it can discard the partial file first.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_LENGTH, HeaderMap, HeaderValue};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::{RemoteError, TransferError};
use super::path::{download_url, encode_download_url};
use super::retry::{RetryDecision, RetryPolicy};
use super::types::{ListEnvelope, ListRequest, ListResponse};

/// Browser User-Agent sent with every request.
///
/// Listing endpoints sitting behind bot filters reject unknown clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36";

/// HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Total timeout for one listing call (30 seconds).
pub const LISTING_TIMEOUT: Duration = Duration::from_secs(30);

/// Listing endpoint relative to the host.
const LIST_ENDPOINT: &str = "/api/fs/list";

/// Client for one remote host.
///
/// Cheap to clone; clones share the connection pool.
///
/// # Example
///
/// ```no_run
/// use alist_mirror::remote::{RemoteClient, RetryPolicy, LISTING_TIMEOUT};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RemoteClient::new("http://127.0.0.1:5244", RetryPolicy::for_listing(), LISTING_TIMEOUT)?;
/// let listing = client.list_directory("/Movies").await?;
/// for entry in listing.files() {
///     println!("{}", client.download_url("/Movies", &entry.name));
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: Client,
    host: String,
    listing_retry: RetryPolicy,
    listing_timeout: Duration,
}

impl RemoteClient {
    /// Creates a client for `host` (scheme and authority, no path).
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidUrl`] if `host` is not an absolute URL,
    /// or [`RemoteError::ClientBuild`] if the HTTP client cannot be built.
    #[instrument(level = "debug", skip(listing_retry))]
    pub fn new(
        host: &str,
        listing_retry: RetryPolicy,
        listing_timeout: Duration,
    ) -> Result<Self, RemoteError> {
        Url::parse(host).map_err(|_| RemoteError::invalid_url(host))?;

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .gzip(true)
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(default_headers())
            .build()
            .map_err(RemoteError::ClientBuild)?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            listing_retry,
            listing_timeout,
        })
    }

    /// Returns the host this client talks to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the content URL of `file_name` inside `dir_path`.
    #[must_use]
    pub fn download_url(&self, dir_path: &str, file_name: &str) -> String {
        download_url(&self.host, dir_path, file_name)
    }

    /// Lists `path`, retrying failed attempts with exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Exhausted`] once the retry policy gives up.
    /// Callers treat this as "directory unreachable for this run".
    #[instrument(skip(self))]
    pub async fn list_directory(&self, path: &str) -> Result<ListResponse, RemoteError> {
        let mut failures = 0u32;

        loop {
            let error = match self.list_once(path).await {
                Ok(listing) => {
                    debug!(entries = listing.entries.len(), "listed directory");
                    return Ok(listing);
                }
                Err(error) => error,
            };
            failures += 1;

            match self.listing_retry.should_retry(failures) {
                RetryDecision::Retry { delay, attempt } => {
                    warn!(
                        path,
                        attempt,
                        max_attempts = self.listing_retry.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "listing failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(path, %reason, "not retrying listing");
                    return Err(RemoteError::exhausted(path, failures, error));
                }
            }
        }
    }

    /// One listing attempt: HTTP 200, a decodable body and `code == 200`.
    async fn list_once(&self, path: &str) -> Result<ListResponse, RemoteError> {
        let url = format!("{}{LIST_ENDPOINT}", self.host);

        let response = self
            .client
            .post(&url)
            .timeout(self.listing_timeout)
            .json(&ListRequest::all_entries(path))
            .send()
            .await
            .map_err(|e| RemoteError::from_send(&url, e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(RemoteError::http_status(&url, status.as_u16()));
        }

        let envelope: ListEnvelope = response.json().await.map_err(|e| {
            if e.is_timeout() {
                RemoteError::Timeout { url: url.clone() }
            } else {
                RemoteError::MalformedBody {
                    url: url.clone(),
                    source: e,
                }
            }
        })?;

        if envelope.code != 200 {
            return Err(RemoteError::api_status(path, envelope.code, envelope.message));
        }

        let entries = envelope
            .data
            .and_then(|data| data.content)
            .unwrap_or_default();
        Ok(ListResponse { entries })
    }

    /// Opens the body of `url` for streaming.
    ///
    /// `url` is the raw form from [`download_url`]; its path is encoded here.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidUrl`] for malformed URLs,
    /// [`RemoteError::Network`]/[`RemoteError::Timeout`] if the request fails,
    /// or [`RemoteError::HttpStatus`] for non-success responses.
    #[instrument(skip(self))]
    pub async fn fetch_file(&self, url: &str) -> Result<FileStream, RemoteError> {
        let request_url = Url::parse(&encode_download_url(&self.host, url))
            .map_err(|_| RemoteError::invalid_url(url))?;

        let response = self
            .client
            .get(request_url)
            .send()
            .await
            .map_err(|e| RemoteError::from_send(url, e))?;

        if !response.status().is_success() {
            return Err(RemoteError::http_status(url, response.status().as_u16()));
        }

        let total_size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);

        Ok(FileStream {
            url: url.to_string(),
            total_size,
            response,
        })
    }
}

/// An open file body.
#[derive(Debug)]
pub struct FileStream {
    url: String,
    total_size: u64,
    response: reqwest::Response,
}

impl FileStream {
    /// Declared size from `content-length`, 0 when absent.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Copies the body into `writer`, calling `on_chunk` with each chunk's
    /// length. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Stream`] when the body fails mid-stream and
    /// [`TransferError::Write`] when `writer` rejects a chunk.
    pub async fn copy_to<W>(
        self,
        writer: &mut W,
        mut on_chunk: impl FnMut(u64),
    ) -> Result<u64, TransferError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut stream = self.response.bytes_stream();
        let mut bytes_written: u64 = 0;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| RemoteError::from_send(&self.url, e))?;

            writer
                .write_all(&chunk)
                .await
                .map_err(TransferError::Write)?;

            let len = chunk.len() as u64;
            bytes_written += len;
            on_chunk(len);
        }

        writer.flush().await.map_err(TransferError::Write)?;

        Ok(bytes_written)
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.9"));
    headers
}
