//! Top-level driver for one mirror run.
//!
//! A session first drains the failure queue left by earlier runs, one task
//! at a time, and only then walks the tree from the configured root. The
//! store is opened once and shared by both phases.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::MirrorConfig;
use crate::db::{Database, DbError};
use crate::engine::{EngineError, TraversalEngine, TraversalStats, VisitOutcome};
use crate::materialize::{DownloadOutcome, FileMaterializer, MaterializeError};
use crate::progress::ProgressSink;
use crate::remote::{RemoteClient, RemoteError};
use crate::store::{IdempotencyStore, StoreError};

/// Fatal session errors. Remote failures never end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Could not create the local output root.
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        /// The directory that could not be created.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Could not open the store.
    #[error(transparent)]
    Database(#[from] DbError),

    /// Could not build the HTTP client.
    #[error(transparent)]
    Client(#[from] RemoteError),

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Writing local output failed while retrying the failure queue.
    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    /// The traversal failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Summary of a finished session.
#[derive(Debug)]
pub struct SessionReport {
    /// Failure-queue entries retried at startup.
    pub retried: usize,
    /// Retried entries that downloaded successfully and left the queue.
    pub recovered: usize,
    /// Retried entries that failed again and remain queued.
    pub still_failing: usize,
    /// How the root visit ended.
    pub root_outcome: VisitOutcome,
    /// Counters from the traversal phase.
    pub traversal: Arc<TraversalStats>,
}

/// Counts from the failure-queue phase.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetrySummary {
    /// Entries attempted.
    pub retried: usize,
    /// Entries cleared after a successful download.
    pub recovered: usize,
    /// Entries that stay queued.
    pub still_failing: usize,
}

/// One configured mirror run.
#[derive(Debug)]
pub struct Session {
    config: MirrorConfig,
    store: IdempotencyStore,
    materializer: FileMaterializer,
    engine: TraversalEngine,
}

impl Session {
    /// Prepares a session: creates the output root, opens the store and
    /// builds the client, materializer and engine.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if any of those steps fail.
    #[instrument(skip(config, progress), fields(host = %config.redacted_host(), root = %config.root_path))]
    pub async fn open(
        config: MirrorConfig,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<Self, SessionError> {
        tokio::fs::create_dir_all(&config.local_root)
            .await
            .map_err(|source| SessionError::OutputDir {
                path: config.local_root.display().to_string(),
                source,
            })?;

        let store = IdempotencyStore::new(Database::new(&config.store_path).await?);
        let client = RemoteClient::new(
            &config.host,
            config.listing_retry.clone(),
            config.listing_timeout,
        )?;
        let materializer = FileMaterializer::new(
            client.clone(),
            config.local_root.clone(),
            config.download_retry.clone(),
            progress,
        )
        .with_reserved_store(&config.store_path);
        let engine = TraversalEngine::new(client, store.clone(), materializer.clone(), config.workers)?
            .with_strict_completion(config.strict_completion);

        Ok(Self {
            config,
            store,
            materializer,
            engine,
        })
    }

    /// Returns the store this session writes to.
    #[must_use]
    pub fn store(&self) -> &IdempotencyStore {
        &self.store
    }

    /// Runs the failure-queue phase, then the traversal.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] on store failures or local IO failures.
    #[instrument(skip(self), fields(root = %self.config.root_path))]
    pub async fn run(&self) -> Result<SessionReport, SessionError> {
        let retry = self.retry_failed_files().await?;

        info!(root = %self.config.root_path, workers = self.engine.workers(), "starting traversal");
        let root_outcome = self.engine.visit(self.config.root_path.clone()).await?;

        let stats = Arc::clone(self.engine.stats());
        info!(
            outcome = ?root_outcome,
            directories = stats.directories_completed(),
            skipped = stats.directories_skipped(),
            unreachable = stats.directories_unreachable(),
            pointers = stats.pointers_written(),
            downloaded = stats.files_downloaded(),
            failed = stats.files_failed(),
            "traversal finished"
        );

        Ok(SessionReport {
            retried: retry.retried,
            recovered: retry.recovered,
            still_failing: retry.still_failing,
            root_outcome,
            traversal: stats,
        })
    }

    /// Retries every queued failure sequentially, in insertion order.
    ///
    /// A success clears the record. A repeated failure leaves it queued.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] on store failures or local IO failures.
    #[instrument(skip(self))]
    pub async fn retry_failed_files(&self) -> Result<RetrySummary, SessionError> {
        let tasks = self.store.list_failed_files().await?;
        let mut summary = RetrySummary::default();
        if tasks.is_empty() {
            return Ok(summary);
        }

        info!(count = tasks.len(), "retrying queued failures");
        for task in tasks {
            summary.retried += 1;
            let outcome = match self.materializer.download_file(&task).await {
                Ok(outcome) => outcome,
                Err(error) if error.is_entry_local() => {
                    warn!(task = %task, error = %error, "queued entry cannot be written, leaving it queued");
                    summary.still_failing += 1;
                    continue;
                }
                Err(error) => return Err(error.into()),
            };

            match outcome {
                DownloadOutcome::Completed { .. } => {
                    self.store.clear_failure(&task.dir_path, &task.file_name).await?;
                    summary.recovered += 1;
                }
                DownloadOutcome::Exhausted { attempts, .. } => {
                    self.store.record_failure(&task).await?;
                    warn!(task = %task, attempts, "queued download failed again");
                    summary.still_failing += 1;
                }
            }
        }

        info!(
            retried = summary.retried,
            recovered = summary.recovered,
            still_failing = summary.still_failing,
            "failure queue processed"
        );
        Ok(summary)
    }

    /// Closes the store so the WAL is checkpointed.
    pub async fn close(self) {
        self.store.database().clone().close().await;
    }
}
