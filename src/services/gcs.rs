//! Google Cloud Storage JSON API client.
//!
//! `GcsConnector` owns the process-wide connection pool; every request gets
//! its own `GcsClient` bound to the caller's token and endpoint, dropped when
//! the handler finishes.

use crate::{
    models::{bucket::BucketEntry, credentials::Credentials, object::FileEntry},
    services::storage_service::{
        ContentFormat, StorageClient, StorageConnector, StorageError, StorageResult,
        content_type_for, decode_upload, encode_content, folder_key, rebase_key,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const FOLDER_CONTENT_TYPE: &str = "application/x-directory";

#[derive(Debug, Deserialize)]
struct GcsBucket {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcsBucketList {
    #[serde(default)]
    items: Vec<GcsBucket>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GcsObject {
    name: String,
    /// Decimal string, as the JSON API encodes uint64 values.
    size: Option<String>,
    updated: Option<DateTime<Utc>>,
}

impl GcsObject {
    fn into_entry(self) -> FileEntry {
        let size = self.size.as_deref().and_then(|s| s.parse().ok());
        let entry = if self.name.ends_with('/') {
            FileEntry::folder(self.name)
        } else {
            FileEntry::file(self.name).with_size(size)
        };
        entry.with_updated(self.updated)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcsObjectList {
    #[serde(default)]
    items: Vec<GcsObject>,
    #[serde(default)]
    prefixes: Vec<String>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcsRewriteResponse {
    #[serde(default)]
    done: bool,
    rewrite_token: Option<String>,
    resource: Option<GcsObject>,
}

#[derive(Debug, Deserialize)]
struct GcsErrorDetail {
    code: Option<u16>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GcsErrorResponse {
    error: Option<GcsErrorDetail>,
}

/// Map a failed GCS response to an in-band backend error.
fn backend_error(status: u16, body: &str) -> StorageError {
    if let Ok(GcsErrorResponse {
        error: Some(detail),
    }) = serde_json::from_str::<GcsErrorResponse>(body)
    {
        if let Some(message) = detail.message {
            return StorageError::backend(detail.code.unwrap_or(status), message);
        }
    }
    let body = body.trim();
    if body.is_empty() {
        StorageError::backend(status, format!("HTTP {}", status))
    } else {
        StorageError::backend(status, body)
    }
}

/// Turn one delimiter listing page set into browser entries.
fn entries_from_listing(prefix: &str, listing: GcsObjectList) -> Vec<FileEntry> {
    let mut entries: Vec<FileEntry> = listing.prefixes.into_iter().map(FileEntry::folder).collect();
    entries.extend(
        listing
            .items
            .into_iter()
            .filter(|object| object.name != prefix)
            .map(GcsObject::into_entry),
    );
    entries
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, NON_ALPHANUMERIC).to_string()
}

/// Opens [`GcsClient`] sessions over a shared connection pool.
#[derive(Clone)]
pub struct GcsConnector {
    http: reqwest::Client,
}

impl GcsConnector {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

impl StorageConnector for GcsConnector {
    fn connect(&self, credentials: Credentials, endpoint: &str) -> Box<dyn StorageClient> {
        Box::new(GcsClient::new(self.http.clone(), credentials, endpoint))
    }
}

/// A request-scoped GCS session.
pub struct GcsClient {
    http: reqwest::Client,
    credentials: Credentials,
    endpoint: String,
}

impl GcsClient {
    pub fn new(http: reqwest::Client, credentials: Credentials, endpoint: &str) -> Self {
        let mut endpoint = endpoint.to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        Self {
            http,
            credentials,
            endpoint,
        }
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!("{}storage/v1/b/{}", self.endpoint, encode_segment(bucket))
    }

    fn objects_url(&self, bucket: &str) -> String {
        format!("{}/o", self.bucket_url(bucket))
    }

    fn object_url(&self, bucket: &str, name: &str) -> String {
        format!("{}/o/{}", self.bucket_url(bucket), encode_segment(name))
    }

    fn upload_url(&self, bucket: &str) -> String {
        format!(
            "{}upload/storage/v1/b/{}/o",
            self.endpoint,
            encode_segment(bucket)
        )
    }

    /// Send with the caller's token; non-2xx responses become backend errors.
    async fn send(&self, request: reqwest::RequestBuilder) -> StorageResult<reqwest::Response> {
        let response = request
            .bearer_auth(&self.credentials.access_token)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!("GCS request failed with {}: {}", status, body);
        Err(backend_error(status.as_u16(), &body))
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> StorageResult<GcsObjectList> {
        let mut listing = GcsObjectList::default();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .http
                .get(self.objects_url(bucket))
                .query(&[("prefix", prefix)]);
            if let Some(delimiter) = delimiter {
                request = request.query(&[("delimiter", delimiter)]);
            }
            if let Some(token) = page_token.as_deref() {
                request = request.query(&[("pageToken", token)]);
            }

            let page: GcsObjectList = self.send(request).await?.json().await?;
            listing.items.extend(page.items);
            listing.prefixes.extend(page.prefixes);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(listing)
    }

    async fn upload(
        &self,
        bucket: &str,
        name: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> StorageResult<GcsObject> {
        let request = self
            .http
            .post(self.upload_url(bucket))
            .query(&[("uploadType", "media"), ("name", name)])
            .header(CONTENT_TYPE, content_type)
            .body(body);
        Ok(self.send(request).await?.json().await?)
    }

    async fn metadata(&self, bucket: &str, name: &str) -> StorageResult<GcsObject> {
        let request = self.http.get(self.object_url(bucket, name));
        Ok(self.send(request).await?.json().await?)
    }

    async fn download(&self, bucket: &str, name: &str) -> StorageResult<Bytes> {
        let request = self
            .http
            .get(self.object_url(bucket, name))
            .query(&[("alt", "media")]);
        Ok(self.send(request).await?.bytes().await?)
    }

    async fn delete_object(&self, bucket: &str, name: &str) -> StorageResult<()> {
        self.send(self.http.delete(self.object_url(bucket, name)))
            .await?;
        Ok(())
    }

    /// Copy an object within `bucket`, following rewrite tokens until done.
    async fn rewrite(
        &self,
        bucket: &str,
        source: &str,
        destination: &str,
    ) -> StorageResult<GcsObject> {
        let url = format!(
            "{}/rewriteTo/b/{}/o/{}",
            self.object_url(bucket, source),
            encode_segment(bucket),
            encode_segment(destination)
        );
        let mut rewrite_token: Option<String> = None;
        loop {
            let mut request = self
                .http
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .body("{}");
            if let Some(token) = rewrite_token.as_deref() {
                request = request.query(&[("rewriteToken", token)]);
            }

            let response: GcsRewriteResponse = self.send(request).await?.json().await?;
            if response.done {
                return response.resource.ok_or_else(|| {
                    StorageError::Decode("rewrite finished without a resource".into())
                });
            }
            match response.rewrite_token {
                Some(token) => rewrite_token = Some(token),
                None => {
                    return Err(StorageError::Decode(
                        "rewrite unfinished without a continuation token".into(),
                    ));
                }
            }
        }
    }
}

#[async_trait]
impl StorageClient for GcsClient {
    async fn list_buckets(&self, prefix: &str) -> StorageResult<Vec<BucketEntry>> {
        let url = format!("{}storage/v1/b", self.endpoint);
        let mut buckets = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .http
                .get(&url)
                .query(&[("project", self.credentials.project_id.as_str())]);
            if !prefix.is_empty() {
                request = request.query(&[("prefix", prefix)]);
            }
            if let Some(token) = page_token.as_deref() {
                request = request.query(&[("pageToken", token)]);
            }

            let page: GcsBucketList = self.send(request).await?.json().await?;
            buckets.extend(page.items.into_iter().map(|b| BucketEntry::new(b.name)));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        debug!("listed {} buckets with prefix {:?}", buckets.len(), prefix);
        Ok(buckets)
    }

    async fn list_files(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<FileEntry>> {
        let listing = self.list_objects(bucket, prefix, Some("/")).await?;
        Ok(entries_from_listing(prefix, listing))
    }

    async fn create_folder(
        &self,
        bucket: &str,
        path: &str,
        folder_name: &str,
    ) -> StorageResult<FileEntry> {
        let key = folder_key(path, folder_name);
        debug!("creating folder marker {}/{}", bucket, key);
        let object = self
            .upload(bucket, &key, FOLDER_CONTENT_TYPE, Vec::new())
            .await?;
        Ok(FileEntry::folder(key).with_updated(object.updated))
    }

    async fn save_content(
        &self,
        bucket: &str,
        path: &str,
        contents: &str,
        upload: bool,
    ) -> StorageResult<FileEntry> {
        let body = if upload {
            decode_upload(contents)?
        } else {
            contents.as_bytes().to_vec()
        };
        debug!("saving {} bytes to {}/{}", body.len(), bucket, path);
        let object = self
            .upload(bucket, path, content_type_for(path, upload), body)
            .await?;
        Ok(object.into_entry())
    }

    async fn get_file(
        &self,
        bucket: &str,
        path: &str,
        format: ContentFormat,
    ) -> StorageResult<Bytes> {
        let content = self.download(bucket, path).await?;
        Ok(encode_content(content, format))
    }

    async fn delete_file(&self, bucket: &str, path: Option<&str>) -> StorageResult<()> {
        let Some(path) = path.filter(|p| !p.is_empty()) else {
            debug!("deleting bucket {}", bucket);
            self.send(self.http.delete(self.bucket_url(bucket))).await?;
            return Ok(());
        };

        if !path.ends_with('/') {
            return self.delete_object(bucket, path).await;
        }

        let listing = self.list_objects(bucket, path, None).await?;
        if listing.items.is_empty() {
            return Err(StorageError::not_found(bucket, path));
        }
        for object in listing.items {
            self.delete_object(bucket, &object.name).await?;
        }
        Ok(())
    }

    async fn rename_file(
        &self,
        bucket: &str,
        old_path: &str,
        new_path: &str,
    ) -> StorageResult<FileEntry> {
        if !old_path.ends_with('/') {
            // Rewriting onto the same key and then deleting the source would drop it.
            if old_path == new_path {
                return Ok(self.metadata(bucket, old_path).await?.into_entry());
            }
            let object = self.rewrite(bucket, old_path, new_path).await?;
            self.delete_object(bucket, old_path).await?;
            return Ok(object.into_entry());
        }

        let listing = self.list_objects(bucket, old_path, None).await?;
        if listing.items.is_empty() {
            return Err(StorageError::not_found(bucket, old_path));
        }
        let target = FileEntry::folder(new_path);
        if target.path == old_path {
            return Ok(target);
        }
        for object in listing.items {
            let Some(key) = rebase_key(&object.name, old_path, new_path) else {
                continue;
            };
            self.rewrite(bucket, &object.name, &key).await?;
            self.delete_object(bucket, &object.name).await?;
        }
        Ok(target)
    }

    async fn download_file(
        &self,
        bucket: &str,
        path: &str,
        name: &str,
        format: ContentFormat,
    ) -> StorageResult<Bytes> {
        debug!("downloading {}/{} as {}", bucket, path, name);
        let content = self.download(bucket, path).await?;
        Ok(encode_content(content, format))
    }
}
