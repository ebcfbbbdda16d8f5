//! Database connection and schema management.
//!
//! This module provides the SQLite connection pool backing the mirror's
//! persistent state:
//! - Connection pool management
//! - WAL mode so traversal workers can read while another writes
//! - Automatic migration execution
//!
//! # Example
//!
//! ```no_run
//! use alist_mirror::Database;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(Path::new("mirror.db")).await?;
//! // Hand db to IdempotencyStore::new...
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::instrument;

/// Default maximum number of connections in the pool.
/// Kept low for SQLite since it uses file-level locking.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout.
/// Connections will wait this long before returning SQLITE_BUSY.
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Database-related errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connection(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Failed to create the directory holding the database file.
    #[error("failed to create database directory {path}: {source}")]
    Directory {
        /// Directory that could not be created.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Database connection wrapper with connection pool.
///
/// Handles SQLite connection pooling, WAL mode configuration,
/// and automatic migration execution.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database at the specified path.
    ///
    /// This will:
    /// 1. Create the parent directory and database file if they don't exist
    /// 2. Enable WAL mode and a busy timeout on every pooled connection
    /// 3. Run any pending migrations
    ///
    /// # Errors
    ///
    /// Returns `DbError::Directory` if the parent directory cannot be created,
    /// `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn new(db_path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| DbError::Directory {
                    path: parent.display().to_string(),
                    source,
                })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates an in-memory database for testing.
    ///
    /// The database exists only for the lifetime of the single pooled
    /// connection. WAL mode is not enabled for in-memory databases as it
    /// provides no benefit.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checks if WAL mode is enabled.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the query fails.
    #[instrument(skip(self))]
    pub async fn is_wal_enabled(&self) -> Result<bool, DbError> {
        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&self.pool)
            .await?;

        Ok(result.0.eq_ignore_ascii_case("wal"))
    }

    /// Gracefully closes all connections in the pool.
    ///
    /// Called before the process exits so the WAL is checkpointed.
    #[instrument(skip(self))]
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_new_in_memory_succeeds() {
        let db = Database::new_in_memory().await;
        assert!(db.is_ok(), "Failed to create in-memory database");
    }

    #[tokio::test]
    async fn test_database_processed_paths_table_exists() {
        let db = Database::new_in_memory().await.unwrap();

        let result = sqlx::query("INSERT INTO processed_paths (path) VALUES ('/Movies')")
            .execute(db.pool())
            .await;

        assert!(result.is_ok(), "processed_paths should exist after migration");
    }

    #[tokio::test]
    async fn test_database_failed_files_primary_key_is_composite() {
        let db = Database::new_in_memory().await.unwrap();

        let insert = "INSERT INTO failed_files (dir_path, file_name, url) VALUES (?, ?, ?)";
        sqlx::query(insert)
            .bind("/Movies")
            .bind("bonus.zip")
            .bind("http://host/d/Movies/bonus.zip")
            .execute(db.pool())
            .await
            .unwrap();

        // Same file name in another directory is a distinct identity
        let other_dir = sqlx::query(insert)
            .bind("/Shows")
            .bind("bonus.zip")
            .bind("http://host/d/Shows/bonus.zip")
            .execute(db.pool())
            .await;
        assert!(other_dir.is_ok());

        let duplicate = sqlx::query(insert)
            .bind("/Movies")
            .bind("bonus.zip")
            .bind("http://host/d/Movies/bonus.zip")
            .execute(db.pool())
            .await;
        assert!(duplicate.is_err(), "duplicate identity must violate the key");
    }

    #[tokio::test]
    async fn test_database_with_tempfile_enables_wal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("state").join("mirror.db");

        let db = Database::new(&db_path).await.unwrap();

        assert!(db_path.exists(), "database file and parent dir should be created");
        assert!(db.is_wal_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn test_database_reopen_keeps_schema() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("mirror.db");

        let db = Database::new(&db_path).await.unwrap();
        sqlx::query("INSERT INTO processed_paths (path) VALUES ('/a')")
            .execute(db.pool())
            .await
            .unwrap();
        db.close().await;

        let reopened = Database::new(&db_path).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM processed_paths")
            .fetch_one(reopened.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
