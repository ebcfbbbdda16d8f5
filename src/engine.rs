//! Recursive traversal of the remote tree.
//!
//! This module provides the [`TraversalEngine`], which walks the remote
//! directory tree from a root path, materializes every file it finds and
//! records each finished directory in the [`IdempotencyStore`].
//!
//! # Scheduling
//!
//! Every directory visit runs as its own tokio task. A semaphore bounds how
//! many visits list and materialize at once. A visit holds its permit only
//! while it does that work: it spawns its subdirectory visits, materializes
//! its files sequentially, then releases the permit *before* awaiting its
//! children. Waiting therefore never occupies a slot, so no tree shape can
//! starve the pool, and tree depth grows the task count instead of the call
//! stack.
//!
//! # Per-directory states
//!
//! `Skipped` (already processed) → `Listing` → `Dispatching` →
//! `AwaitingChildren` → `Completed`. A listing that exhausts its retries
//! ends the visit without marking the directory, so the next run lists it
//! again.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::materialize::{DownloadOutcome, FileMaterializer, MaterializeError, Materialized};
use crate::remote::{RemoteClient, join_remote_path};
use crate::store::{IdempotencyStore, StoreError};

/// Minimum allowed worker count.
pub const MIN_WORKERS: usize = 1;

/// Maximum allowed worker count.
pub const MAX_WORKERS: usize = 100;

/// Default worker count.
pub const DEFAULT_WORKERS: usize = 5;

/// Error type for traversal operations.
///
/// Only unrecoverable local failures surface here. Network failures are
/// contained to the file or subtree they affect.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid worker count provided.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidWorkers {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Writing local output failed.
    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Lifecycle state of one directory visit, used in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryState {
    /// Already processed by an earlier visit.
    Skipped,
    /// Listing call in flight.
    Listing,
    /// Spawning subdirectories and materializing files.
    Dispatching,
    /// Waiting for subdirectory visits to return.
    AwaitingChildren,
    /// Marked processed.
    Completed,
}

impl fmt::Display for DirectoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Skipped => "skipped",
            Self::Listing => "listing",
            Self::Dispatching => "dispatching",
            Self::AwaitingChildren => "awaiting_children",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// How a directory visit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitOutcome {
    /// The directory was already processed; nothing was done.
    Skipped,
    /// Listing exhausted its retries; the directory stays unprocessed.
    Unreachable,
    /// Every child was handled and the directory is now processed.
    Completed,
    /// Strict completion only: a descendant was not completed, so this
    /// directory was left unprocessed for the next run.
    Deferred,
}

impl VisitOutcome {
    /// Returns true when the directory is now (or was already) processed.
    #[must_use]
    pub fn is_processed(self) -> bool {
        matches!(self, Self::Skipped | Self::Completed)
    }
}

/// Counters from one traversal.
///
/// Uses atomic counters for updates from concurrent visits.
#[derive(Debug, Default)]
pub struct TraversalStats {
    directories_completed: AtomicUsize,
    directories_skipped: AtomicUsize,
    directories_unreachable: AtomicUsize,
    pointers_written: AtomicUsize,
    files_downloaded: AtomicUsize,
    files_failed: AtomicUsize,
    bytes_downloaded: AtomicU64,
    download_retries: AtomicUsize,
}

impl TraversalStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Directories marked processed during this traversal.
    #[must_use]
    pub fn directories_completed(&self) -> usize {
        self.directories_completed.load(Ordering::SeqCst)
    }

    /// Directories skipped because they were already processed.
    #[must_use]
    pub fn directories_skipped(&self) -> usize {
        self.directories_skipped.load(Ordering::SeqCst)
    }

    /// Directories whose listing exhausted its retries.
    #[must_use]
    pub fn directories_unreachable(&self) -> usize {
        self.directories_unreachable.load(Ordering::SeqCst)
    }

    /// Pointer files written.
    #[must_use]
    pub fn pointers_written(&self) -> usize {
        self.pointers_written.load(Ordering::SeqCst)
    }

    /// Files downloaded completely.
    #[must_use]
    pub fn files_downloaded(&self) -> usize {
        self.files_downloaded.load(Ordering::SeqCst)
    }

    /// Files that exhausted their retries and were queued.
    #[must_use]
    pub fn files_failed(&self) -> usize {
        self.files_failed.load(Ordering::SeqCst)
    }

    /// Bytes written by completed downloads.
    #[must_use]
    pub fn bytes_downloaded(&self) -> u64 {
        self.bytes_downloaded.load(Ordering::SeqCst)
    }

    /// Extra download attempts beyond the first, across all files.
    #[must_use]
    pub fn download_retries(&self) -> usize {
        self.download_retries.load(Ordering::SeqCst)
    }

    pub(crate) fn record_download(&self, outcome: &DownloadOutcome) {
        let retries = outcome.attempts().saturating_sub(1) as usize;
        self.download_retries.fetch_add(retries, Ordering::SeqCst);
        match outcome {
            DownloadOutcome::Completed { bytes, .. } => {
                self.files_downloaded.fetch_add(1, Ordering::SeqCst);
                self.bytes_downloaded.fetch_add(*bytes, Ordering::SeqCst);
            }
            DownloadOutcome::Exhausted { .. } => {
                self.files_failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn increment(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Walks the remote tree with a bounded number of concurrent visits.
///
/// Cheap to clone; clones share the semaphore and the stats.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use alist_mirror::{Database, FileMaterializer, IdempotencyStore, NoopProgress, TraversalEngine};
/// use alist_mirror::remote::{LISTING_TIMEOUT, RemoteClient, RetryPolicy};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RemoteClient::new("http://127.0.0.1:5244", RetryPolicy::for_listing(), LISTING_TIMEOUT)?;
/// let store = IdempotencyStore::new(Database::new_in_memory().await?);
/// let materializer = FileMaterializer::new(
///     client.clone(),
///     "./mirror",
///     RetryPolicy::for_downloads(),
///     Arc::new(NoopProgress),
/// );
/// let engine = TraversalEngine::new(client, store, materializer, 5)?;
/// let outcome = engine.visit("/Movies".to_string()).await?;
/// println!("{outcome:?}, {} pointers", engine.stats().pointers_written());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TraversalEngine {
    client: RemoteClient,
    store: IdempotencyStore,
    materializer: FileMaterializer,
    semaphore: Arc<Semaphore>,
    workers: usize,
    strict_completion: bool,
    stats: Arc<TraversalStats>,
}

impl TraversalEngine {
    /// Creates an engine running at most `workers` directory visits at once.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidWorkers`] if the value is outside
    /// the valid range (1-100).
    #[instrument(level = "debug", skip(client, store, materializer))]
    pub fn new(
        client: RemoteClient,
        store: IdempotencyStore,
        materializer: FileMaterializer,
        workers: usize,
    ) -> Result<Self, EngineError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
            return Err(EngineError::InvalidWorkers { value: workers });
        }

        Ok(Self {
            client,
            store,
            materializer,
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
            strict_completion: false,
            stats: Arc::new(TraversalStats::new()),
        })
    }

    /// Leaves a directory unprocessed when any descendant was not completed.
    ///
    /// Off by default: a parent is marked once its children have returned,
    /// even if a child subtree was unreachable, and later runs skip it.
    #[must_use]
    pub fn with_strict_completion(mut self, strict: bool) -> Self {
        self.strict_completion = strict;
        self
    }

    /// Returns the configured worker count.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Returns the counters shared by all visits of this engine.
    #[must_use]
    pub fn stats(&self) -> &Arc<TraversalStats> {
        &self.stats
    }

    /// Visits `path` and, recursively, every directory below it.
    ///
    /// The returned future is `'static` so it can be spawned; each child
    /// visit is spawned as a separate task.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] on store failures or local IO failures
    /// anywhere in the subtree. Remote failures never surface here.
    pub fn visit(&self, path: String) -> BoxFuture<'static, Result<VisitOutcome, EngineError>> {
        let engine = self.clone();
        async move { engine.visit_directory(&path).await }.boxed()
    }

    #[instrument(skip(self))]
    async fn visit_directory(&self, path: &str) -> Result<VisitOutcome, EngineError> {
        if self.store.is_processed(path).await? {
            debug!(state = %DirectoryState::Skipped, "directory already processed");
            TraversalStats::increment(&self.stats.directories_skipped);
            return Ok(VisitOutcome::Skipped);
        }

        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| EngineError::SemaphoreClosed)?;

        debug!(state = %DirectoryState::Listing, "listing directory");
        let listing = match self.client.list_directory(path).await {
            Ok(listing) => listing,
            Err(error) => {
                warn!(error = %error, "directory unreachable, leaving it for the next run");
                TraversalStats::increment(&self.stats.directories_unreachable);
                return Ok(VisitOutcome::Unreachable);
            }
        };

        debug!(
            state = %DirectoryState::Dispatching,
            entries = listing.entries.len(),
            "dispatching entries"
        );
        let children = self.spawn_children(path, listing.directories().map(|e| e.name.as_str()));

        let mut file_result = Ok(());
        for entry in listing.files() {
            if let Err(error) = self.materialize_entry(path, &entry.name).await {
                file_result = Err(error);
                break;
            }
        }
        drop(permit);

        debug!(
            state = %DirectoryState::AwaitingChildren,
            children = children.len(),
            "awaiting subdirectories"
        );
        let all_children_completed = self.await_children(children).await?;
        file_result?;

        if self.strict_completion && !all_children_completed {
            info!("subtree incomplete, directory left unprocessed");
            return Ok(VisitOutcome::Deferred);
        }

        self.store.mark_processed(path).await?;
        TraversalStats::increment(&self.stats.directories_completed);
        self.materializer.progress().directory_completed(path);
        debug!(state = %DirectoryState::Completed, "directory processed");

        Ok(VisitOutcome::Completed)
    }

    fn spawn_children<'a>(
        &self,
        path: &str,
        names: impl Iterator<Item = &'a str>,
    ) -> Vec<(String, JoinHandle<Result<VisitOutcome, EngineError>>)> {
        names
            .filter(|name| {
                let safe = crate::materialize::is_safe_segment(name);
                if !safe {
                    warn!(dir_path = path, name, "skipping subdirectory with unsafe name");
                }
                safe
            })
            .map(|name| {
                let child = join_remote_path(path, name);
                let handle = tokio::spawn(self.visit(child.clone()));
                (child, handle)
            })
            .collect()
    }

    /// Waits for every child. Returns whether all of them ended processed.
    ///
    /// A panicked child counts as not completed. The first fatal child
    /// error is returned after all children have finished.
    async fn await_children(
        &self,
        children: Vec<(String, JoinHandle<Result<VisitOutcome, EngineError>>)>,
    ) -> Result<bool, EngineError> {
        let mut all_completed = true;
        let mut first_error = None;

        for (child, handle) in children {
            match handle.await {
                Ok(Ok(outcome)) => {
                    if !outcome.is_processed() {
                        all_completed = false;
                    }
                }
                Ok(Err(error)) => {
                    all_completed = false;
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
                Err(join_error) => {
                    warn!(child, error = %join_error, "directory visit panicked");
                    all_completed = false;
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(all_completed),
        }
    }

    async fn materialize_entry(&self, dir_path: &str, file_name: &str) -> Result<(), EngineError> {
        match self.materializer.materialize(dir_path, file_name).await {
            Ok(Materialized::Pointer { .. }) => {
                TraversalStats::increment(&self.stats.pointers_written);
            }
            Ok(Materialized::Download { task, outcome }) => {
                self.stats.record_download(&outcome);
                if let DownloadOutcome::Exhausted { attempts, .. } = &outcome {
                    let inserted = self.store.record_failure(&task).await?;
                    warn!(task = %task, attempts, inserted, "download queued for a later run");
                }
            }
            Err(error) if error.is_entry_local() => {
                warn!(error = %error, "skipping entry");
            }
            Err(error) => return Err(error.into()),
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::path::Path;

    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::db::Database;
    use crate::progress::NoopProgress;
    use crate::remote::{LISTING_TIMEOUT, RetryPolicy};
    use crate::store::DownloadTask;

    fn listing(entries: &[(&str, bool)]) -> serde_json::Value {
        let content: Vec<_> = entries
            .iter()
            .map(|(name, is_dir)| json!({"name": name, "is_dir": is_dir}))
            .collect();
        json!({"code": 200, "message": "success", "data": {"content": content}})
    }

    async fn mount_listing(server: &MockServer, dir: &str, entries: &[(&str, bool)], calls: u64) {
        Mock::given(method("POST"))
            .and(url_path("/api/fs/list"))
            .and(body_partial_json(json!({"path": dir})))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(entries)))
            .expect(calls)
            .mount(server)
            .await;
    }

    async fn engine(server: &MockServer, root: &Path, workers: usize) -> TraversalEngine {
        let client =
            RemoteClient::new(&server.uri(), RetryPolicy::immediate(0), LISTING_TIMEOUT).unwrap();
        let store = IdempotencyStore::new(Database::new_in_memory().await.unwrap());
        let materializer = FileMaterializer::new(
            client.clone(),
            root,
            RetryPolicy::immediate(1),
            Arc::new(NoopProgress),
        );
        TraversalEngine::new(client, store, materializer, workers).unwrap()
    }

    #[test]
    fn test_engine_rejects_zero_workers_value() {
        let error = EngineError::InvalidWorkers { value: 0 };
        assert!(error.to_string().contains("between 1 and 100"));
    }

    #[tokio::test]
    async fn test_engine_rejects_out_of_range_workers() {
        let server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();
        let base = engine(&server, temp_dir.path(), 1).await;

        for workers in [0, 101] {
            let result = TraversalEngine::new(
                base.client.clone(),
                base.store.clone(),
                base.materializer.clone(),
                workers,
            );
            assert!(matches!(result, Err(EngineError::InvalidWorkers { value }) if value == workers));
        }
    }

    #[tokio::test]
    async fn test_visit_mirrors_example_tree() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            "/Movies",
            &[("Action", true), ("trailer.txt", false)],
            1,
        )
        .await;
        mount_listing(&server, "/Movies/Action", &[("Fight.mp4", false)], 1).await;
        Mock::given(method("GET"))
            .and(url_path("/d/Movies/trailer.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"coming soon".to_vec()))
            .mount(&server)
            .await;
        let temp_dir = TempDir::new().unwrap();
        let engine = engine(&server, temp_dir.path(), 5).await;

        let outcome = engine.visit("/Movies".to_string()).await.unwrap();

        assert_eq!(outcome, VisitOutcome::Completed);
        assert_eq!(
            std::fs::read(temp_dir.path().join("Movies/trailer.txt")).unwrap(),
            b"coming soon"
        );
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("Movies/Action/Fight.strm")).unwrap(),
            format!("{}/d/Movies/Action/Fight.mp4", server.uri())
        );
        assert!(engine.store.is_processed("/Movies").await.unwrap());
        assert!(engine.store.is_processed("/Movies/Action").await.unwrap());

        let stats = engine.stats();
        assert_eq!(stats.directories_completed(), 2);
        assert_eq!(stats.pointers_written(), 1);
        assert_eq!(stats.files_downloaded(), 1);
        assert_eq!(stats.bytes_downloaded(), 11);
    }

    #[tokio::test]
    async fn test_processed_directory_is_not_listed() {
        let server = MockServer::start().await;
        mount_listing(&server, "/Movies", &[], 0).await;
        let temp_dir = TempDir::new().unwrap();
        let engine = engine(&server, temp_dir.path(), 5).await;
        engine.store.mark_processed("/Movies").await.unwrap();

        let outcome = engine.visit("/Movies".to_string()).await.unwrap();

        assert_eq!(outcome, VisitOutcome::Skipped);
        assert_eq!(engine.stats().directories_skipped(), 1);
    }

    #[tokio::test]
    async fn test_processed_child_is_skipped_but_parent_completes() {
        let server = MockServer::start().await;
        mount_listing(&server, "/", &[("done", true), ("new", true)], 1).await;
        mount_listing(&server, "/done", &[], 0).await;
        mount_listing(&server, "/new", &[], 1).await;
        let temp_dir = TempDir::new().unwrap();
        let engine = engine(&server, temp_dir.path(), 2).await;
        engine.store.mark_processed("/done").await.unwrap();

        let outcome = engine.visit("/".to_string()).await.unwrap();

        assert_eq!(outcome, VisitOutcome::Completed);
        assert!(engine.store.is_processed("/new").await.unwrap());
        assert_eq!(engine.stats().directories_skipped(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_directory_is_not_marked() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(url_path("/api/fs/list"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        let temp_dir = TempDir::new().unwrap();
        let engine = engine(&server, temp_dir.path(), 5).await;

        let outcome = engine.visit("/Movies".to_string()).await.unwrap();

        assert_eq!(outcome, VisitOutcome::Unreachable);
        assert!(!engine.store.is_processed("/Movies").await.unwrap());
        assert_eq!(engine.stats().directories_unreachable(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_child_still_completes_parent_by_default() {
        let server = MockServer::start().await;
        mount_listing(&server, "/Movies", &[("Broken", true)], 1).await;
        Mock::given(method("POST"))
            .and(url_path("/api/fs/list"))
            .and(body_partial_json(json!({"path": "/Movies/Broken"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 500, "message": "boom"})))
            .mount(&server)
            .await;
        let temp_dir = TempDir::new().unwrap();
        let engine = engine(&server, temp_dir.path(), 5).await;

        let outcome = engine.visit("/Movies".to_string()).await.unwrap();

        assert_eq!(outcome, VisitOutcome::Completed);
        assert!(engine.store.is_processed("/Movies").await.unwrap());
        assert!(!engine.store.is_processed("/Movies/Broken").await.unwrap());
    }

    #[tokio::test]
    async fn test_strict_completion_defers_ancestors_of_unreachable() {
        let server = MockServer::start().await;
        mount_listing(&server, "/", &[("Movies", true), ("Shows", true)], 1).await;
        mount_listing(&server, "/Movies", &[("Broken", true)], 1).await;
        mount_listing(&server, "/Shows", &[], 1).await;
        Mock::given(method("POST"))
            .and(url_path("/api/fs/list"))
            .and(body_partial_json(json!({"path": "/Movies/Broken"})))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let temp_dir = TempDir::new().unwrap();
        let engine = engine(&server, temp_dir.path(), 5)
            .await
            .with_strict_completion(true);

        let outcome = engine.visit("/".to_string()).await.unwrap();

        assert_eq!(outcome, VisitOutcome::Deferred);
        assert!(!engine.store.is_processed("/").await.unwrap());
        assert!(!engine.store.is_processed("/Movies").await.unwrap());
        assert!(engine.store.is_processed("/Shows").await.unwrap());
    }

    #[tokio::test]
    async fn test_exhausted_download_is_queued_and_siblings_continue() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            "/Movies",
            &[("bonus.zip", false), ("trailer.txt", false)],
            1,
        )
        .await;
        Mock::given(method("GET"))
            .and(url_path("/d/Movies/bonus.zip"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/d/Movies/trailer.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"t".to_vec()))
            .mount(&server)
            .await;
        let temp_dir = TempDir::new().unwrap();
        let engine = engine(&server, temp_dir.path(), 5).await;

        let outcome = engine.visit("/Movies".to_string()).await.unwrap();

        assert_eq!(outcome, VisitOutcome::Completed);
        assert!(temp_dir.path().join("Movies/trailer.txt").exists());
        assert!(!temp_dir.path().join("Movies/bonus.zip").exists());
        assert_eq!(
            engine.store.list_failed_files().await.unwrap(),
            vec![DownloadTask::new(
                "/Movies",
                "bonus.zip",
                format!("{}/d/Movies/bonus.zip", server.uri())
            )]
        );
        assert_eq!(engine.stats().files_failed(), 1);
        assert_eq!(engine.stats().download_retries(), 1);
    }

    #[tokio::test]
    async fn test_single_worker_handles_deep_and_wide_tree() {
        let server = MockServer::start().await;
        mount_listing(&server, "/", &[("a", true), ("b", true), ("c", true)], 1).await;
        mount_listing(&server, "/a", &[("a1", true)], 1).await;
        mount_listing(&server, "/a/a1", &[("a2", true)], 1).await;
        mount_listing(&server, "/a/a1/a2", &[("deep.mkv", false)], 1).await;
        mount_listing(&server, "/b", &[("b1", true), ("b2", true)], 1).await;
        mount_listing(&server, "/b/b1", &[], 1).await;
        mount_listing(&server, "/b/b2", &[], 1).await;
        mount_listing(&server, "/c", &[], 1).await;
        let temp_dir = TempDir::new().unwrap();
        let engine = engine(&server, temp_dir.path(), 1).await;

        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            engine.visit("/".to_string()),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(outcome, VisitOutcome::Completed);
        assert_eq!(engine.stats().directories_completed(), 8);
        assert!(temp_dir.path().join("a/a1/a2/deep.strm").exists());
    }

    #[tokio::test]
    async fn test_unsafe_names_are_skipped() {
        let server = MockServer::start().await;
        mount_listing(&server, "/", &[("..", true), ("..", false), ("ok.mp4", false)], 1).await;
        let temp_dir = TempDir::new().unwrap();
        let engine = engine(&server, temp_dir.path(), 2).await;

        let outcome = engine.visit("/".to_string()).await.unwrap();

        assert_eq!(outcome, VisitOutcome::Completed);
        assert!(temp_dir.path().join("ok.strm").exists());
        assert_eq!(engine.stats().pointers_written(), 1);
    }

    #[tokio::test]
    async fn test_local_io_failure_is_fatal() {
        let server = MockServer::start().await;
        mount_listing(&server, "/Movies", &[("a.mp4", false)], 1).await;
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("Movies"), b"file, not dir").unwrap();
        let engine = engine(&server, temp_dir.path(), 2).await;

        let result = engine.visit("/Movies".to_string()).await;

        assert!(matches!(result, Err(EngineError::Materialize(_))));
        assert!(!engine.store.is_processed("/Movies").await.unwrap());
    }

    #[test]
    fn test_directory_state_display() {
        assert_eq!(DirectoryState::AwaitingChildren.to_string(), "awaiting_children");
        assert_eq!(DirectoryState::Skipped.to_string(), "skipped");
    }
}
