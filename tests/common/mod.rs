//! Shared fakes for the in-process API tests.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes},
    http::{Request, Response},
};
use gcs_notebook_proxy::{
    AppState,
    config::DEFAULT_MAX_BODY_BYTES,
    create_router,
    models::{bucket::BucketEntry, credentials::Credentials, object::FileEntry},
    services::{
        credentials::{CredentialCache, CredentialProvider, ResolvedCredentials},
        gcloud::{CommandError, CommandOutput, CommandRunner, GcloudCli},
        storage_service::{
            ContentFormat, StorageClient, StorageConnector, StorageError, StorageResult,
            StorageService, folder_key,
        },
        urls::StaticUrlResolver,
    },
};
use http_body_util::BodyExt;
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tower::ServiceExt;

pub const PREFIX: &str = "/gcs-jupyter-plugin";

pub fn usable_credentials() -> Credentials {
    Credentials {
        access_token: "test-token".into(),
        project_id: "test-project".into(),
        region_id: "us-central1".into(),
        config_error: 0,
        login_error: 0,
    }
}

/// Provider returning fixed credentials and counting resolutions.
pub struct FixedProvider {
    pub credentials: Credentials,
    pub calls: AtomicUsize,
}

#[async_trait]
impl CredentialProvider for FixedProvider {
    async fn resolve(&self) -> ResolvedCredentials {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ResolvedCredentials {
            credentials: self.credentials.clone(),
            expires_at: None,
        }
    }
}

/// Behavior of the fake storage backend.
#[derive(Clone, Default)]
pub struct Script {
    /// When set, every call fails with this in-band backend error.
    pub backend_error: Option<(u16, String)>,
    /// When set, every call fails with a non-backend error.
    pub decode_error: Option<String>,
    /// Bytes returned by `get_file` and `download_file`.
    pub content: Bytes,
}

#[derive(Default)]
pub struct Recorder {
    pub sessions: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
    pub script: Mutex<Script>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }
}

pub struct RecordingConnector {
    pub recorder: Arc<Recorder>,
}

impl StorageConnector for RecordingConnector {
    fn connect(&self, credentials: Credentials, endpoint: &str) -> Box<dyn StorageClient> {
        assert_eq!(credentials.access_token, "test-token");
        assert_eq!(endpoint, "http://gcs.test/");
        self.recorder.sessions.fetch_add(1, Ordering::SeqCst);
        Box::new(RecordingClient {
            recorder: self.recorder.clone(),
        })
    }
}

pub struct RecordingClient {
    recorder: Arc<Recorder>,
}

impl RecordingClient {
    fn record(&self, call: String) -> StorageResult<Script> {
        self.recorder.calls.lock().unwrap().push(call);
        let script = self.recorder.script.lock().unwrap().clone();
        if let Some((status, message)) = script.backend_error.clone() {
            return Err(StorageError::backend(status, message));
        }
        if let Some(reason) = script.decode_error.clone() {
            return Err(StorageError::Decode(reason));
        }
        Ok(script)
    }
}

#[async_trait]
impl StorageClient for RecordingClient {
    async fn list_buckets(&self, prefix: &str) -> StorageResult<Vec<BucketEntry>> {
        self.record(format!("list_buckets({prefix})"))?;
        Ok(vec![BucketEntry::new("alpha"), BucketEntry::new("beta")])
    }

    async fn list_files(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<FileEntry>> {
        self.record(format!("list_files({bucket},{prefix})"))?;
        Ok(vec![
            FileEntry::folder(format!("{prefix}sub/")),
            FileEntry::file(format!("{prefix}a.txt")).with_size(Some(3)),
        ])
    }

    async fn create_folder(
        &self,
        bucket: &str,
        path: &str,
        folder_name: &str,
    ) -> StorageResult<FileEntry> {
        self.record(format!("create_folder({bucket},{path},{folder_name})"))?;
        Ok(FileEntry::folder(folder_key(path, folder_name)))
    }

    async fn save_content(
        &self,
        bucket: &str,
        path: &str,
        contents: &str,
        upload: bool,
    ) -> StorageResult<FileEntry> {
        self.record(format!("save_content({bucket},{path},{contents},{upload})"))?;
        Ok(FileEntry::file(path).with_size(Some(contents.len() as u64)))
    }

    async fn get_file(
        &self,
        bucket: &str,
        path: &str,
        format: ContentFormat,
    ) -> StorageResult<Bytes> {
        let script = self.record(format!("get_file({bucket},{path},{format:?})"))?;
        Ok(script.content)
    }

    async fn delete_file(&self, bucket: &str, path: Option<&str>) -> StorageResult<()> {
        self.record(format!("delete_file({bucket},{path:?})"))?;
        Ok(())
    }

    async fn rename_file(
        &self,
        bucket: &str,
        old_path: &str,
        new_path: &str,
    ) -> StorageResult<FileEntry> {
        self.record(format!("rename_file({bucket},{old_path},{new_path})"))?;
        Ok(FileEntry::file(new_path))
    }

    async fn download_file(
        &self,
        bucket: &str,
        path: &str,
        name: &str,
        format: ContentFormat,
    ) -> StorageResult<Bytes> {
        let script = self.record(format!("download_file({bucket},{path},{name},{format:?})"))?;
        Ok(script.content)
    }
}

/// Runner answering every command with a fixed exit status.
pub struct ExitRunner {
    pub status: i32,
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl CommandRunner for ExitRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        _timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", program, args.join(" ")));
        Ok(CommandOutput {
            status: Some(self.status),
            ..CommandOutput::default()
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub recorder: Arc<Recorder>,
    pub provider: Arc<FixedProvider>,
    pub runner: Arc<ExitRunner>,
}

pub struct TestAppBuilder {
    credentials: Credentials,
    token: Option<String>,
    login_status: i32,
    max_body_bytes: usize,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self {
            credentials: usable_credentials(),
            token: None,
            login_status: 0,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl TestAppBuilder {
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn login_status(mut self, status: i32) -> Self {
        self.login_status = status;
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn build(self) -> TestApp {
        let recorder = Arc::new(Recorder::default());
        let provider = Arc::new(FixedProvider {
            credentials: self.credentials,
            calls: AtomicUsize::new(0),
        });
        let runner = Arc::new(ExitRunner {
            status: self.login_status,
            calls: Mutex::new(Vec::new()),
        });

        let storage = StorageService::new(
            Arc::new(CredentialCache::new(provider.clone(), Duration::from_secs(300))),
            Arc::new(StaticUrlResolver::storage("http://gcs.test")),
            Arc::new(RecordingConnector {
                recorder: recorder.clone(),
            }),
        );
        let gcloud = GcloudCli::new(
            runner.clone(),
            "gcloud",
            Duration::from_secs(5),
            Duration::from_secs(5),
        );
        let state = AppState::new(storage, gcloud, self.token);

        TestApp {
            router: create_router(state, "/", self.max_body_bytes),
            recorder,
            provider,
            runner,
        }
    }
}

pub fn test_app() -> TestApp {
    TestAppBuilder::default().build()
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, path_and_query: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("GET")
                .uri(format!("{PREFIX}{path_and_query}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(format!("{PREFIX}{path}"))
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_form(&self, path: &str, form: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(format!("{PREFIX}{path}"))
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
    }
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
