//! Error types for local materialization.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while writing mirror output.
///
/// Network failures never appear here: they are retried and, once
/// exhausted, reported through [`DownloadOutcome`](super::DownloadOutcome).
#[derive(Debug, Error)]
pub enum MaterializeError {
    /// File system error (create directory, create file, write).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A remote name would resolve outside the local root.
    #[error("refusing unsafe remote name {name:?} in {dir_path}")]
    UnsafePath {
        /// Remote directory of the entry.
        dir_path: String,
        /// The offending name or segment.
        name: String,
    },

    /// The local path is occupied by the mirror's own state store.
    #[error("refusing to overwrite the state store at {path}")]
    Reserved {
        /// The reserved local path.
        path: PathBuf,
    },
}

impl MaterializeError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an unsafe path error.
    pub fn unsafe_path(dir_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnsafePath {
            dir_path: dir_path.into(),
            name: name.into(),
        }
    }

    /// Creates a reserved path error.
    pub fn reserved(path: impl Into<PathBuf>) -> Self {
        Self::Reserved { path: path.into() }
    }

    /// Returns true for errors confined to one entry, which the traversal skips.
    #[must_use]
    pub fn is_entry_local(&self) -> bool {
        matches!(self, Self::UnsafePath { .. } | Self::Reserved { .. })
    }
}
