//! Represents an object (file) or a key prefix (folder) inside a bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a listing entry is a stored object or a key prefix.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Folder,
}

/// A single entry of a folder listing, or the entity a mutation operated on.
///
/// Folders are zero-byte marker objects whose key ends with `/`; `path` keeps
/// that trailing slash while `name` does not.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    /// Last path segment.
    pub name: String,

    /// Full object key within the bucket.
    pub path: String,

    #[serde(rename = "type")]
    pub file_type: FileType,

    /// Size in bytes, when known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub size: Option<u64>,

    /// Last modification time, when known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub updated: Option<DateTime<Utc>>,
}

impl FileEntry {
    /// Build a file entry from a full object key.
    pub fn file(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: last_segment(&path).to_string(),
            path,
            file_type: FileType::File,
            size: None,
            updated: None,
        }
    }

    /// Build a folder entry from a key prefix. A missing trailing `/` is added.
    pub fn folder(path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.ends_with('/') {
            path.push('/');
        }
        Self {
            name: last_segment(&path).to_string(),
            path,
            file_type: FileType::Folder,
            size: None,
            updated: None,
        }
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    pub fn with_updated(mut self, updated: Option<DateTime<Utc>>) -> Self {
        self.updated = updated;
        self
    }
}

fn last_segment(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
