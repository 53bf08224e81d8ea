//! Maps logical Google service names to endpoint URLs.

use crate::services::gcloud::GcloudCli;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::warn;

pub const STORAGE_SERVICE_NAME: &str = "storage";
pub const STORAGE_SERVICE_DEFAULT_URL: &str = "https://storage.googleapis.com/";

/// Endpoint map returned by `getGcpServiceUrls`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ServiceUrls {
    pub storage_url: String,
}

#[async_trait]
pub trait UrlResolver: Send + Sync {
    /// Base URL of `service`, always ending with `/`.
    async fn service_url(&self, service: &str) -> String;
}

pub async fn map(resolver: &dyn UrlResolver) -> ServiceUrls {
    ServiceUrls {
        storage_url: resolver.service_url(STORAGE_SERVICE_NAME).await,
    }
}

pub fn default_url(service: &str) -> String {
    if service == STORAGE_SERVICE_NAME {
        STORAGE_SERVICE_DEFAULT_URL.to_string()
    } else {
        format!("https://{}.googleapis.com/", service)
    }
}

fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

/// Resolves endpoints from explicit overrides, then gcloud's
/// `api_endpoint_overrides`, then the public default.
///
/// gcloud lookups are remembered for the life of the process.
pub struct GcloudUrlResolver {
    gcloud: GcloudCli,
    overrides: HashMap<String, String>,
    resolved: RwLock<HashMap<String, String>>,
}

impl GcloudUrlResolver {
    pub fn new(gcloud: GcloudCli, overrides: HashMap<String, String>) -> Self {
        Self {
            gcloud,
            overrides,
            resolved: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl UrlResolver for GcloudUrlResolver {
    async fn service_url(&self, service: &str) -> String {
        if let Some(url) = self.overrides.get(service) {
            return with_trailing_slash(url.clone());
        }
        if let Some(url) = self.resolved.read().await.get(service) {
            return url.clone();
        }

        let url = match self.gcloud.config_helper().await {
            Ok(config) => config
                .endpoint_override(service)
                .map(str::to_string)
                .unwrap_or_else(|| default_url(service)),
            Err(err) => {
                // Not remembered, so a later lookup can still see the override.
                warn!("using default {} endpoint: {}", service, err);
                return default_url(service);
            }
        };
        let url = with_trailing_slash(url);
        self.resolved
            .write()
            .await
            .insert(service.to_string(), url.clone());
        url
    }
}

/// Resolver with a fixed endpoint per service.
#[derive(Debug, Clone, Default)]
pub struct StaticUrlResolver {
    urls: HashMap<String, String>,
}

impl StaticUrlResolver {
    pub fn storage(url: impl Into<String>) -> Self {
        let mut urls = HashMap::new();
        urls.insert(STORAGE_SERVICE_NAME.to_string(), url.into());
        Self { urls }
    }
}

#[async_trait]
impl UrlResolver for StaticUrlResolver {
    async fn service_url(&self, service: &str) -> String {
        self.urls
            .get(service)
            .cloned()
            .map(with_trailing_slash)
            .unwrap_or_else(|| default_url(service))
    }
}
