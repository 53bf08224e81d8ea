//! src/services/storage_service.rs
//!
//! The storage client contract the handlers call, and `StorageService`, which
//! opens one client session per request from the cached credentials and the
//! resolved storage endpoint.

use crate::{
    models::{bucket::BucketEntry, credentials::Credentials, object::FileEntry},
    services::{
        credentials::{CredentialCache, CredentialError},
        urls::{STORAGE_SERVICE_NAME, UrlResolver},
    },
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Error reported by the storage backend with its own HTTP status.
    #[error("{message}")]
    Backend { status: u16, message: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error("invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unexpected storage response: {0}")]
    Decode(String),
}

impl StorageError {
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(bucket: &str, path: &str) -> Self {
        Self::backend(404, format!("No such object: {}/{}", bucket, path))
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Representation requested for file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    Json,
    Base64,
    Text,
}

impl ContentFormat {
    /// Any value other than `json` or `base64` means raw text.
    pub fn parse(value: &str) -> Self {
        match value {
            "json" => Self::Json,
            "base64" => Self::Base64,
            _ => Self::Text,
        }
    }
}

/// One request-scoped session against the storage backend.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn list_buckets(&self, prefix: &str) -> StorageResult<Vec<BucketEntry>>;

    /// List one level below `prefix`: sub-prefixes as folders, objects as files.
    async fn list_files(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<FileEntry>>;

    async fn create_folder(
        &self,
        bucket: &str,
        path: &str,
        folder_name: &str,
    ) -> StorageResult<FileEntry>;

    /// Store `contents` at `path`. With `upload` set, `contents` is base64.
    async fn save_content(
        &self,
        bucket: &str,
        path: &str,
        contents: &str,
        upload: bool,
    ) -> StorageResult<FileEntry>;

    async fn get_file(&self, bucket: &str, path: &str, format: ContentFormat)
    -> StorageResult<Bytes>;

    /// Delete an object, every object under a `/`-terminated prefix, or the
    /// bucket itself when `path` is `None`.
    async fn delete_file(&self, bucket: &str, path: Option<&str>) -> StorageResult<()>;

    async fn rename_file(
        &self,
        bucket: &str,
        old_path: &str,
        new_path: &str,
    ) -> StorageResult<FileEntry>;

    async fn download_file(
        &self,
        bucket: &str,
        path: &str,
        name: &str,
        format: ContentFormat,
    ) -> StorageResult<Bytes>;
}

/// Opens storage sessions bound to one caller's credentials and endpoint.
pub trait StorageConnector: Send + Sync {
    fn connect(&self, credentials: Credentials, endpoint: &str) -> Box<dyn StorageClient>;
}

/// Entry point used by the handlers to obtain a storage session.
#[derive(Clone)]
pub struct StorageService {
    credentials: Arc<CredentialCache>,
    urls: Arc<dyn UrlResolver>,
    connector: Arc<dyn StorageConnector>,
}

impl StorageService {
    pub fn new(
        credentials: Arc<CredentialCache>,
        urls: Arc<dyn UrlResolver>,
        connector: Arc<dyn StorageConnector>,
    ) -> Self {
        Self {
            credentials,
            urls,
            connector,
        }
    }

    pub fn credentials(&self) -> &CredentialCache {
        &self.credentials
    }

    pub fn urls(&self) -> &dyn UrlResolver {
        self.urls.as_ref()
    }

    /// Open a session for the current request. Dropping it releases it.
    pub async fn session(&self) -> StorageResult<Box<dyn StorageClient>> {
        let credentials = self.credentials.require().await?;
        let endpoint = self.urls.service_url(STORAGE_SERVICE_NAME).await;
        Ok(self.connector.connect(credentials, &endpoint))
    }
}

/// Object key of the marker for `folder_name` inside `path`.
pub fn folder_key(path: &str, folder_name: &str) -> String {
    let parent = path.trim_matches('/');
    let name = folder_name.trim_matches('/');
    if parent.is_empty() {
        format!("{}/", name)
    } else {
        format!("{}/{}/", parent, name)
    }
}

/// Decode browser upload content, accepting an optional data-URL prefix.
pub fn decode_upload(contents: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = match contents.split_once(";base64,") {
        Some((head, data)) if head.starts_with("data:") => data,
        _ => contents,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    general_purpose::STANDARD.decode(compact)
}

pub fn content_type_for(path: &str, upload: bool) -> &'static str {
    if upload {
        "application/octet-stream"
    } else if path.ends_with(".ipynb") || path.ends_with(".json") {
        "application/json"
    } else {
        "text/plain"
    }
}

/// Render object bytes in the requested format.
pub fn encode_content(content: Bytes, format: ContentFormat) -> Bytes {
    match format {
        ContentFormat::Base64 => Bytes::from(general_purpose::STANDARD.encode(&content)),
        ContentFormat::Json | ContentFormat::Text => content,
    }
}

/// Rewrite `key` from under `old_prefix` to under `new_prefix`.
pub fn rebase_key(key: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    let suffix = key.strip_prefix(old_prefix)?;
    let mut rebased = new_prefix.to_string();
    if !rebased.ends_with('/') {
        rebased.push('/');
    }
    rebased.push_str(suffix);
    Some(rebased)
}
