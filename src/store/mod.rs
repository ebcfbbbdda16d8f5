//! Durable idempotency state for the mirror.
//!
//! The store owns two logically unrelated tables:
//! - `processed_paths` - remote directories whose children have all been
//!   dispatched; a recorded directory is never listed again.
//! - `failed_files` - files whose download exhausted its retries and must be
//!   retried by the next session.
//!
//! Every operation is a single statement, so each one is atomic and durable
//! on return without spanning transactions across components. Workers share
//! one [`IdempotencyStore`] (it is cheap to clone) and never cache its
//! contents; the database stays the single source of truth.
//!
//! # Example
//!
//! ```ignore
//! use alist_mirror::{Database, DownloadTask, IdempotencyStore};
//!
//! let store = IdempotencyStore::new(Database::new_in_memory().await?);
//! store.mark_processed("/Movies").await?;
//! assert!(store.is_processed("/Movies").await?);
//!
//! store.record_failure(&DownloadTask::new("/Movies", "bonus.zip", url)).await?;
//! for task in store.list_failed_files().await? {
//!     // ... retry ...
//!     store.clear_failure(&task.dir_path, &task.file_name).await?;
//! }
//! ```

mod error;
mod task;

pub use error::StoreError;
pub use task::DownloadTask;

use tracing::{debug, instrument};

use crate::db::Database;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistent record of processed directories and queued download failures.
#[derive(Debug, Clone)]
pub struct IdempotencyStore {
    db: Database,
}

impl IdempotencyStore {
    /// Creates a store over an already-migrated database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the underlying database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Returns true when `path` has been recorded as processed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn is_processed(&self, path: &str) -> Result<bool> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM processed_paths WHERE path = ?")
            .bind(path)
            .fetch_optional(self.db.pool())
            .await
            .map_err(StoreError::during("is_processed"))?;

        Ok(found.is_some())
    }

    /// Records `path` as processed. Recording an already-processed path is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    #[instrument(skip(self))]
    pub async fn mark_processed(&self, path: &str) -> Result<()> {
        let result = sqlx::query("INSERT OR IGNORE INTO processed_paths (path) VALUES (?)")
            .bind(path)
            .execute(self.db.pool())
            .await
            .map_err(StoreError::during("mark_processed"))?;

        if result.rows_affected() == 0 {
            debug!(path, "directory already recorded as processed");
        }
        Ok(())
    }

    /// Returns the number of processed directories.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn processed_count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM processed_paths")
            .fetch_one(self.db.pool())
            .await
            .map_err(StoreError::during("processed_count"))?;
        Ok(count)
    }

    /// Returns every queued failure in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list_failed_files(&self) -> Result<Vec<DownloadTask>> {
        let tasks = sqlx::query_as::<_, DownloadTask>(
            r"SELECT dir_path, file_name, url
              FROM failed_files
              ORDER BY rowid ASC",
        )
        .fetch_all(self.db.pool())
        .await
        .map_err(StoreError::during("list_failed_files"))?;

        Ok(tasks)
    }

    /// Returns the number of queued failures.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn failed_count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM failed_files")
            .fetch_one(self.db.pool())
            .await
            .map_err(StoreError::during("failed_count"))?;
        Ok(count)
    }

    /// Queues `task` for retry by a later session.
    ///
    /// At most one record exists per `(dir_path, file_name)`; recording a
    /// known failure again keeps the original record and its position.
    ///
    /// Returns true when a new record was inserted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    #[instrument(skip(self, task), fields(task = %task))]
    pub async fn record_failure(&self, task: &DownloadTask) -> Result<bool> {
        let result = sqlx::query(
            r"INSERT OR IGNORE INTO failed_files (dir_path, file_name, url)
              VALUES (?, ?, ?)",
        )
        .bind(&task.dir_path)
        .bind(&task.file_name)
        .bind(&task.url)
        .execute(self.db.pool())
        .await
        .map_err(StoreError::during("record_failure"))?;

        Ok(result.rows_affected() > 0)
    }

    /// Removes the failure record for `(dir_path, file_name)`, if any.
    ///
    /// Returns true when a record was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn clear_failure(&self, dir_path: &str, file_name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM failed_files WHERE dir_path = ? AND file_name = ?")
            .bind(dir_path)
            .bind(file_name)
            .execute(self.db.pool())
            .await
            .map_err(StoreError::during("clear_failure"))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn store() -> IdempotencyStore {
        IdempotencyStore::new(Database::new_in_memory().await.unwrap())
    }

    fn task(dir: &str, name: &str) -> DownloadTask {
        DownloadTask::new(dir, name, format!("http://host/d{dir}/{name}"))
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_processed() {
        let store = store().await;
        assert!(!store.is_processed("/Movies").await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_processed_then_is_processed() {
        let store = store().await;
        store.mark_processed("/Movies").await.unwrap();

        assert!(store.is_processed("/Movies").await.unwrap());
        // Exact string identity: no prefix or case folding
        assert!(!store.is_processed("/Movies/Action").await.unwrap());
        assert!(!store.is_processed("/movies").await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_processed_twice_is_silent() {
        let store = store().await;
        store.mark_processed("/Movies").await.unwrap();
        store.mark_processed("/Movies").await.unwrap();

        assert_eq!(store.processed_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_files_listed_in_insertion_order() {
        let store = store().await;
        store.record_failure(&task("/b", "2.zip")).await.unwrap();
        store.record_failure(&task("/a", "1.zip")).await.unwrap();
        store.record_failure(&task("/c", "3.zip")).await.unwrap();

        let names: Vec<String> = store
            .list_failed_files()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.file_name)
            .collect();
        assert_eq!(names, vec!["2.zip", "1.zip", "3.zip"]);
    }

    #[tokio::test]
    async fn test_record_failure_is_idempotent_per_identity() {
        let store = store().await;
        assert!(store.record_failure(&task("/Movies", "bonus.zip")).await.unwrap());
        assert!(!store.record_failure(&task("/Movies", "bonus.zip")).await.unwrap());

        let mut changed_url = task("/Movies", "bonus.zip");
        changed_url.url = "http://other/d/Movies/bonus.zip".to_string();
        assert!(!store.record_failure(&changed_url).await.unwrap());

        let failed = store.list_failed_files().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].url, "http://host/d/Movies/bonus.zip");
    }

    #[tokio::test]
    async fn test_clear_failure_removes_only_matching_record() {
        let store = store().await;
        store.record_failure(&task("/Movies", "bonus.zip")).await.unwrap();
        store.record_failure(&task("/Shows", "bonus.zip")).await.unwrap();

        assert!(store.clear_failure("/Movies", "bonus.zip").await.unwrap());

        let failed = store.list_failed_files().await.unwrap();
        assert_eq!(failed, vec![task("/Shows", "bonus.zip")]);
    }

    #[tokio::test]
    async fn test_clear_failure_absent_is_noop() {
        let store = store().await;
        assert!(!store.clear_failure("/nowhere", "x.bin").await.unwrap());
        assert_eq!(store.failed_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_tables_are_independent() {
        let store = store().await;
        store.record_failure(&task("/Movies", "bonus.zip")).await.unwrap();

        assert!(!store.is_processed("/Movies").await.unwrap());
        store.mark_processed("/Movies").await.unwrap();
        assert_eq!(store.failed_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_closed_store_reports_failing_operation() {
        let store = store().await;
        store.database().clone().close().await;

        let err = store.mark_processed("/Movies").await.unwrap_err();

        assert_eq!(err.operation(), "mark_processed");
        assert!(matches!(
            err,
            StoreError::Database {
                source: sqlx::Error::PoolClosed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("mirror.db");

        let store = IdempotencyStore::new(Database::new(&db_path).await.unwrap());
        store.mark_processed("/Movies").await.unwrap();
        store.record_failure(&task("/Movies", "bonus.zip")).await.unwrap();
        store.database().clone().close().await;

        let reopened = IdempotencyStore::new(Database::new(&db_path).await.unwrap());
        assert!(reopened.is_processed("/Movies").await.unwrap());
        assert_eq!(
            reopened.list_failed_files().await.unwrap(),
            vec![task("/Movies", "bonus.zip")]
        );
    }

    #[tokio::test]
    async fn test_concurrent_marks_from_many_tasks() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = IdempotencyStore::new(
            Database::new(&temp_dir.path().join("mirror.db"))
                .await
                .unwrap(),
        );

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.mark_processed(&format!("/dir{}", i % 10)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.processed_count().await.unwrap(), 10);
    }
}
