//! Error types for remote listing and transfer operations.

use thiserror::Error;

/// Errors raised while talking to the remote listing/content API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body could not be decoded as a listing.
    #[error("malformed response from {url}: {source}")]
    MalformedBody {
        /// The URL whose body failed to decode.
        url: String,
        /// The underlying decode error.
        #[source]
        source: reqwest::Error,
    },

    /// The listing API answered with a non-success `code` field.
    #[error("listing {path} rejected by server (code {code}): {message}")]
    ApiStatus {
        /// Remote directory that was requested.
        path: String,
        /// The `code` field of the response body.
        code: i64,
        /// The `message` field of the response body.
        message: String,
    },

    /// Every listing attempt failed.
    #[error("listing {path} failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Remote directory that could not be listed.
        path: String,
        /// Number of attempts made.
        attempts: u32,
        /// The final failure.
        #[source]
        last: Box<RemoteError>,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl RemoteError {
    /// Creates a network or timeout error from a reqwest send error.
    pub fn from_send(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an API status error from a listing body.
    pub fn api_status(path: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self::ApiStatus {
            path: path.into(),
            code,
            message: message.into(),
        }
    }

    /// Wraps the last failure of an exhausted retry loop.
    pub fn exhausted(path: impl Into<String>, attempts: u32, last: RemoteError) -> Self {
        Self::Exhausted {
            path: path.into(),
            attempts,
            last: Box::new(last),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}

/// Failure while copying a file body to local storage.
///
/// The two variants are handled differently by the caller: a stream failure
/// discards the partial file and retries the transfer, a write failure is a
/// local problem and aborts the session.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The response body failed mid-stream.
    #[error(transparent)]
    Stream(#[from] RemoteError),

    /// Writing a chunk to the local file failed.
    #[error("local write failed: {0}")]
    Write(#[source] std::io::Error),
}
