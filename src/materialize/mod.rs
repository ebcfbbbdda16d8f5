//! Local materialization of remote files.
//!
//! The local tree mirrors the remote one under a configured root:
//! `<root>/<dir_path>/<file_name>`. Video files become `<name>.strm` pointer
//! files whose whole content is the download URL; everything else is copied
//! byte for byte.
//!
//! # Retry Behavior
//!
//! A transfer that fails anywhere between the request and the last chunk is
//! restarted from scratch (the partial file is truncated) after a
//! `2^n`-second backoff. Once the policy is exhausted the partial file is
//! removed and [`DownloadOutcome::Exhausted`] is returned; the caller must
//! queue the task in the failure store. Local IO errors are never retried.

mod classify;
mod error;

pub use classify::{FileKind, POINTER_EXTENSION, VIDEO_EXTENSIONS, classify};
pub use error::MaterializeError;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::BufWriter;
use tracing::{debug, info, instrument, warn};

use crate::progress::ProgressSink;
use crate::remote::{RemoteClient, RemoteError, RetryDecision, RetryPolicy, TransferError};
use crate::store::DownloadTask;

/// Result of a full download with retries.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The file was written completely.
    Completed {
        /// Local file path.
        path: PathBuf,
        /// Bytes written.
        bytes: u64,
        /// Attempts used, including the successful one.
        attempts: u32,
    },
    /// Every attempt failed; the task belongs in the failure queue.
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// The final failure.
        last_error: RemoteError,
    },
}

impl DownloadOutcome {
    /// Number of attempts made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Completed { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// What happened to one listed file.
#[derive(Debug)]
pub enum Materialized {
    /// A pointer file was written.
    Pointer {
        /// Local pointer file path.
        path: PathBuf,
    },
    /// The file was downloaded or exhausted its retries.
    Download {
        /// The task that was attempted.
        task: DownloadTask,
        /// How the transfer ended.
        outcome: DownloadOutcome,
    },
}

enum AttemptError {
    Remote(RemoteError),
    Local(std::io::Error),
}

/// Writes pointer files and downloads file content under a local root.
#[derive(Clone)]
pub struct FileMaterializer {
    client: RemoteClient,
    local_root: PathBuf,
    retry_policy: RetryPolicy,
    progress: Arc<dyn ProgressSink>,
    reserved: Vec<PathBuf>,
}

impl std::fmt::Debug for FileMaterializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileMaterializer")
            .field("local_root", &self.local_root)
            .field("retry_policy", &self.retry_policy)
            .field("reserved", &self.reserved)
            .finish_non_exhaustive()
    }
}

impl FileMaterializer {
    /// Creates a materializer writing under `local_root`.
    #[must_use]
    pub fn new(
        client: RemoteClient,
        local_root: impl Into<PathBuf>,
        retry_policy: RetryPolicy,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            client,
            local_root: local_root.into(),
            retry_policy,
            progress,
            reserved: Vec::new(),
        }
    }

    /// Never writes to `db_path` or its SQLite `-wal`/`-shm` side files.
    ///
    /// A store kept inside the mirror root would otherwise be overwritten by
    /// a remote file of the same name.
    #[must_use]
    pub fn with_reserved_store(mut self, db_path: &Path) -> Self {
        let db_path = absolute_lexical(db_path);
        for suffix in ["-wal", "-shm"] {
            let mut side = db_path.clone().into_os_string();
            side.push(suffix);
            self.reserved.push(PathBuf::from(side));
        }
        self.reserved.push(db_path);
        self
    }

    /// Returns the local root.
    #[must_use]
    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// Returns the progress sink transfers report to.
    #[must_use]
    pub fn progress(&self) -> &Arc<dyn ProgressSink> {
        &self.progress
    }

    /// Returns the download retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Maps a remote `(dir_path, file_name)` to its local path.
    ///
    /// # Errors
    ///
    /// Returns [`MaterializeError::UnsafePath`] if any segment is `.`, `..`
    /// or contains a path separator, since it would escape the mirror root,
    /// and [`MaterializeError::Reserved`] if the path belongs to the store.
    pub fn local_path(&self, dir_path: &str, file_name: &str) -> Result<PathBuf, MaterializeError> {
        let mut path = self.local_root.clone();
        for segment in dir_path.split('/').filter(|s| !s.is_empty()) {
            if !is_safe_segment(segment) {
                return Err(MaterializeError::unsafe_path(dir_path, segment));
            }
            path.push(segment);
        }
        if !is_safe_segment(file_name) {
            return Err(MaterializeError::unsafe_path(dir_path, file_name));
        }
        path.push(file_name);

        if self
            .reserved
            .iter()
            .any(|reserved| *reserved == absolute_lexical(&path))
        {
            return Err(MaterializeError::reserved(path));
        }
        Ok(path)
    }

    /// Classifies `file_name` and materializes it.
    ///
    /// # Errors
    ///
    /// Returns [`MaterializeError`] for unsafe names or local IO failures.
    /// Exhausted downloads are not errors; see [`Materialized::Download`].
    pub async fn materialize(
        &self,
        dir_path: &str,
        file_name: &str,
    ) -> Result<Materialized, MaterializeError> {
        let url = self.client.download_url(dir_path, file_name);
        match classify(file_name) {
            FileKind::Pointer { base_name } => {
                let path = self.write_pointer(dir_path, base_name, &url).await?;
                Ok(Materialized::Pointer { path })
            }
            FileKind::Download => {
                let task = DownloadTask::new(dir_path, file_name, url);
                let outcome = self.download_file(&task).await?;
                Ok(Materialized::Download { task, outcome })
            }
        }
    }

    /// Writes `<root>/<dir_path>/<base_name>.strm` containing `url`.
    ///
    /// Overwrites any existing file, so repeating it is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`MaterializeError`] for unsafe names or local IO failures.
    #[instrument(skip(self, url))]
    pub async fn write_pointer(
        &self,
        dir_path: &str,
        base_name: &str,
        url: &str,
    ) -> Result<PathBuf, MaterializeError> {
        let path = self.local_path(dir_path, &format!("{base_name}.{POINTER_EXTENSION}"))?;
        create_parent_dir(&path).await?;

        tokio::fs::write(&path, url.as_bytes())
            .await
            .map_err(|e| MaterializeError::io(&path, e))?;

        debug!(path = %path.display(), "pointer written");
        Ok(path)
    }

    /// Downloads `task` to its mirrored local path, retrying whole transfers.
    ///
    /// # Errors
    ///
    /// Returns [`MaterializeError`] for unsafe names or local IO failures.
    /// Network failures are retried and end in [`DownloadOutcome::Exhausted`].
    #[instrument(skip(self, task), fields(task = %task))]
    pub async fn download_file(
        &self,
        task: &DownloadTask,
    ) -> Result<DownloadOutcome, MaterializeError> {
        let path = self.local_path(&task.dir_path, &task.file_name)?;
        create_parent_dir(&path).await?;

        let label = task.to_string();
        let mut failures = 0u32;

        loop {
            let error = match self.attempt_download(&task.url, &path, &label).await {
                Ok(bytes) => {
                    info!(path = %path.display(), bytes, "download complete");
                    return Ok(DownloadOutcome::Completed {
                        path,
                        bytes,
                        attempts: failures + 1,
                    });
                }
                Err(AttemptError::Local(source)) => {
                    return Err(MaterializeError::io(path, source));
                }
                Err(AttemptError::Remote(error)) => error,
            };
            failures += 1;

            match self.retry_policy.should_retry(failures) {
                RetryDecision::Retry { delay, attempt } => {
                    warn!(
                        url = %task.url,
                        attempt,
                        max_attempts = self.retry_policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "download failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    warn!(url = %task.url, %reason, error = %error, "download abandoned");
                    remove_partial(&path).await;
                    return Ok(DownloadOutcome::Exhausted {
                        attempts: failures,
                        last_error: error,
                    });
                }
            }
        }
    }

    async fn attempt_download(
        &self,
        url: &str,
        path: &Path,
        label: &str,
    ) -> Result<u64, AttemptError> {
        let stream = self
            .client
            .fetch_file(url)
            .await
            .map_err(AttemptError::Remote)?;

        self.progress.transfer_started(label, stream.total_size());

        let file = File::create(path).await.map_err(AttemptError::Local)?;
        let mut writer = BufWriter::new(file);

        let result = stream
            .copy_to(&mut writer, |bytes| self.progress.transfer_progress(label, bytes))
            .await;

        self.progress.transfer_finished(label, result.is_ok());

        result.map_err(|e| match e {
            TransferError::Stream(remote) => AttemptError::Remote(remote),
            TransferError::Write(io) => AttemptError::Local(io),
        })
    }
}

/// Returns true when `segment` can be used as one local path component.
pub(crate) fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}

fn absolute_lexical(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

async fn create_parent_dir(path: &Path) -> Result<(), MaterializeError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    // create_dir_all already treats "exists" as success, which keeps
    // concurrent workers creating the same parent safe.
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| MaterializeError::io(parent, e))
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial file"),
    }
}
