//! Download task type shared by the traversal, the materializer and the
//! failure queue.

use std::fmt;

use sqlx::FromRow;

/// One file pending transfer.
///
/// Created during a listing pass or loaded from the failure queue at
/// startup. Its identity in the failure queue is `(dir_path, file_name)`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct DownloadTask {
    /// Normalized remote directory holding the file.
    pub dir_path: String,
    /// File name as listed by the remote.
    pub file_name: String,
    /// Absolute download URL.
    pub url: String,
}

impl DownloadTask {
    /// Creates a task from its parts.
    pub fn new(
        dir_path: impl Into<String>,
        file_name: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            dir_path: dir_path.into(),
            file_name: file_name.into(),
            url: url.into(),
        }
    }
}

impl fmt::Display for DownloadTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dir_path.ends_with('/') {
            write!(f, "{}{}", self.dir_path, self.file_name)
        } else {
            write!(f, "{}/{}", self.dir_path, self.file_name)
        }
    }
}
