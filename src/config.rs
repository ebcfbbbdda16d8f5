//! Resolved mirror configuration.
//!
//! [`MirrorConfig`] is the single value handed to a [`Session`](crate::Session).
//! It is built from a source URL such as
//! `http://nas:5244/Movies%20HD` plus a local output directory; the
//! binary maps its flags onto the builder methods.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::engine::{DEFAULT_WORKERS, MAX_WORKERS, MIN_WORKERS};
use crate::remote::{LISTING_TIMEOUT, RetryPolicy, normalize_remote_path};

/// File name of the store when no explicit location is given.
pub const DEFAULT_STORE_FILE: &str = ".alist-mirror.db";

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The source URL could not be parsed.
    #[error("invalid source URL '{url}': {reason}")]
    InvalidSourceUrl {
        /// The offending input.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The source URL path is not valid percent-encoded UTF-8.
    #[error("source path '{path}' is not valid percent-encoded UTF-8")]
    InvalidPathEncoding {
        /// The raw path.
        path: String,
    },

    /// Worker count outside the allowed range.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidWorkers {
        /// The invalid value that was provided.
        value: usize,
    },
}

impl ConfigError {
    fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSourceUrl {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Everything a mirror session needs, fully resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorConfig {
    /// Scheme and authority of the remote, without a trailing slash.
    pub host: String,
    /// Normalized, percent-decoded remote path the traversal starts at.
    pub root_path: String,
    /// Local directory the remote tree is mirrored into.
    pub local_root: PathBuf,
    /// SQLite store location.
    pub store_path: PathBuf,
    /// Maximum concurrent directory visits.
    pub workers: usize,
    /// Retry policy for listing calls.
    pub listing_retry: RetryPolicy,
    /// Retry policy for whole-file transfers.
    pub download_retry: RetryPolicy,
    /// Timeout for one listing call.
    pub listing_timeout: Duration,
    /// Leave directories unprocessed while any descendant is incomplete.
    pub strict_completion: bool,
}

impl MirrorConfig {
    /// Resolves `source_url` into host and root path, mirroring into `local_root`.
    ///
    /// The path is percent-decoded exactly once here; every path below the
    /// root is taken verbatim from listings. The store defaults to
    /// `<local_root>/.alist-mirror.db`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSourceUrl`] for unparseable or non-HTTP
    /// URLs and [`ConfigError::InvalidPathEncoding`] for undecodable paths.
    pub fn from_source_url(source_url: &str, local_root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let url = Url::parse(source_url.trim())
            .map_err(|e| ConfigError::invalid_url(source_url, e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid_url(
                source_url,
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        if url.host_str().is_none() {
            return Err(ConfigError::invalid_url(source_url, "missing host"));
        }

        // Userinfo stays in the authority so basic-auth servers keep working
        let mut base = url.clone();
        base.set_path("");
        base.set_query(None);
        base.set_fragment(None);
        let authority = base.as_str().trim_end_matches('/').to_string();

        let decoded = urlencoding::decode(url.path()).map_err(|_| {
            ConfigError::InvalidPathEncoding {
                path: url.path().to_string(),
            }
        })?;

        let local_root = local_root.into();
        let store_path = local_root.join(DEFAULT_STORE_FILE);

        Ok(Self {
            host: authority,
            root_path: normalize_remote_path(&decoded),
            local_root,
            store_path,
            workers: DEFAULT_WORKERS,
            listing_retry: RetryPolicy::for_listing(),
            download_retry: RetryPolicy::for_downloads(),
            listing_timeout: LISTING_TIMEOUT,
            strict_completion: false,
        })
    }

    /// Sets the store location.
    #[must_use]
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    /// Sets the worker count.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidWorkers`] outside 1-100.
    pub fn with_workers(mut self, workers: usize) -> Result<Self, ConfigError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
            return Err(ConfigError::InvalidWorkers { value: workers });
        }
        self.workers = workers;
        Ok(self)
    }

    /// Sets the retry ceiling for both listings and downloads, keeping
    /// their backoff schedules.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.listing_retry = self.listing_retry.with_max_retries(max_retries);
        self.download_retry = self.download_retry.with_max_retries(max_retries);
        self
    }

    /// Replaces both retry policies.
    #[must_use]
    pub fn with_retry_policies(mut self, listing: RetryPolicy, download: RetryPolicy) -> Self {
        self.listing_retry = listing;
        self.download_retry = download;
        self
    }

    /// Enables or disables strict completion.
    #[must_use]
    pub fn with_strict_completion(mut self, strict: bool) -> Self {
        self.strict_completion = strict;
        self
    }

    /// Returns the store location.
    #[must_use]
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Returns the host with any password masked, for logging.
    #[must_use]
    pub fn redacted_host(&self) -> String {
        match Url::parse(&self.host) {
            Ok(mut url) if url.password().is_some() => {
                // Cannot fail: the URL has a host, or it would have no password
                let _ = url.set_password(Some("***"));
                url.as_str().trim_end_matches('/').to_string()
            }
            _ => self.host.clone(),
        }
    }
}
