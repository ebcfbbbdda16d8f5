//! Error types for idempotency store operations.

use thiserror::Error;

/// Errors that can occur during store operations.
///
/// Every store error is fatal to the session: the store is the only record
/// of completed work, so continuing without it would repeat or lose work.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A statement against the store failed.
    #[error("store operation '{operation}' failed: {source}")]
    Database {
        /// The store operation that issued the statement.
        operation: &'static str,
        /// The underlying database error.
        #[source]
        source: sqlx::Error,
    },
}

impl StoreError {
    /// Returns a mapper tagging a `sqlx::Error` with the failing operation.
    pub(crate) fn during(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Database { operation, source }
    }

    /// Returns the store operation that failed.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Database { operation, .. } => operation,
        }
    }
}
