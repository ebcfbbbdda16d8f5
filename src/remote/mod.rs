//! Access to the remote file listing.
//!
//! The remote exposes two operations the mirror needs:
//! - `POST {host}/api/fs/list` - list one directory (retried with backoff)
//! - `GET {host}/d{path}/{name}` - stream one file's content
//!
//! # Features
//!
//! - Listing retries with exponential backoff and jitter (11 attempts)
//! - 30s timeout per listing call, transport defaults for downloads
//! - Streaming file bodies with per-chunk progress callbacks
//! - Structured error types with full context

mod client;
mod error;
mod path;
mod retry;
mod types;

pub use client::{BROWSER_USER_AGENT, CONNECT_TIMEOUT, FileStream, LISTING_TIMEOUT, RemoteClient};
pub use error::{RemoteError, TransferError};
pub use path::{download_url, encode_download_url, join_remote_path, normalize_remote_path};
pub use retry::{DEFAULT_MAX_RETRIES, LISTING_MAX_JITTER, RetryDecision, RetryPolicy};
pub use types::{ListRequest, ListResponse, RemoteEntry};
