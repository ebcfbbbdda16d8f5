//! Alist Mirror Library
//!
//! This library mirrors a remote Alist file listing onto local storage.
//! Directories are walked recursively, video files become `.strm` pointer
//! files carrying their stream URL, and every other file is downloaded in
//! full. Completed directories and exhausted downloads are persisted, so an
//! interrupted run resumes without repeating finished work.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Resolved configuration
//! - [`db`] - Database connection and schema management
//! - [`store`] - Processed directories and the failure queue
//! - [`remote`] - Listing API client, wire types and retry policy
//! - [`materialize`] - Pointer files and file downloads
//! - [`engine`] - Bounded-concurrency tree traversal
//! - [`session`] - Failure-queue retry followed by traversal
//! - [`progress`] - Progress reporting hooks

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod db;
pub mod engine;
pub mod materialize;
pub mod progress;
pub mod remote;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use config::{ConfigError, DEFAULT_STORE_FILE, MirrorConfig};
pub use db::{Database, DbError};
pub use engine::{
    DEFAULT_WORKERS, DirectoryState, EngineError, TraversalEngine, TraversalStats, VisitOutcome,
};
pub use materialize::{DownloadOutcome, FileKind, FileMaterializer, MaterializeError, Materialized, classify};
pub use progress::{NoopProgress, ProgressSink};
pub use remote::{RemoteClient, RemoteEntry, RemoteError, RetryPolicy};
pub use session::{RetrySummary, Session, SessionError, SessionReport};
pub use store::{DownloadTask, IdempotencyStore, StoreError};
