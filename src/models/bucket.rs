//! Represents a bucket as returned by `listBuckets`.

use serde::{Deserialize, Serialize};

/// A top-level storage container in the cloud backend.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BucketEntry {
    /// Globally unique bucket name.
    pub name: String,
}

impl BucketEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
