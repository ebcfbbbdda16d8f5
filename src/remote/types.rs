//! Wire types for the listing API.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/fs/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ListRequest<'a> {
    pub path: &'a str,
    pub password: &'a str,
    pub page: u32,
    pub per_page: u32,
    pub refresh: bool,
}

impl<'a> ListRequest<'a> {
    /// Requests every entry of `path` in one page, served from the remote cache.
    #[must_use]
    pub fn all_entries(path: &'a str) -> Self {
        Self {
            path,
            password: "",
            page: 1,
            per_page: 0,
            refresh: false,
        }
    }
}

/// Envelope of every listing response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListEnvelope {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<ListData>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListData {
    /// The server sends `null` for an empty directory.
    #[serde(default)]
    pub content: Option<Vec<RemoteEntry>>,
}

/// One listing row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteEntry {
    /// Entry name within its directory.
    pub name: String,
    /// True for subdirectories.
    #[serde(rename = "is_dir")]
    pub is_directory: bool,
}

impl RemoteEntry {
    /// Creates an entry; used by callers assembling listings by hand.
    pub fn new(name: impl Into<String>, is_directory: bool) -> Self {
        Self {
            name: name.into(),
            is_directory,
        }
    }
}

/// A successful directory listing, in server order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListResponse {
    pub entries: Vec<RemoteEntry>,
}

impl ListResponse {
    /// Iterates over file entries.
    pub fn files(&self) -> impl Iterator<Item = &RemoteEntry> {
        self.entries.iter().filter(|e| !e.is_directory)
    }

    /// Iterates over subdirectory entries.
    pub fn directories(&self) -> impl Iterator<Item = &RemoteEntry> {
        self.entries.iter().filter(|e| e.is_directory)
    }
}
