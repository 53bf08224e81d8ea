//! Credential acquisition and the process-wide credential cache.
//!
//! Handlers never talk to gcloud directly: they ask the [`CredentialCache`]
//! owned by the server, which refreshes through a [`CredentialProvider`].

use crate::{models::credentials::Credentials, services::gcloud::GcloudCli};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Tokens this close to expiry are refreshed rather than handed out.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("gcloud is not configured; set a project with `gcloud config set project`")]
    NotConfigured,
    #[error("no active gcloud login; run `gcloud auth login`")]
    NotLoggedIn,
}

/// Freshly resolved credentials and, when known, when the token expires.
#[derive(Debug, Clone)]
pub struct ResolvedCredentials {
    pub credentials: Credentials,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Source of ambient cloud credentials.
///
/// Resolution never fails outright: configuration and login problems are
/// reported through the `config_error`/`login_error` flags so the browser can
/// show a helpful message.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn resolve(&self) -> ResolvedCredentials;
}

/// Resolves credentials from `gcloud config config-helper`.
pub struct GcloudCredentialProvider {
    gcloud: GcloudCli,
}

impl GcloudCredentialProvider {
    pub fn new(gcloud: GcloudCli) -> Self {
        Self { gcloud }
    }
}

#[async_trait]
impl CredentialProvider for GcloudCredentialProvider {
    async fn resolve(&self) -> ResolvedCredentials {
        let config = match self.gcloud.config_helper().await {
            Ok(config) => config,
            Err(err) => {
                warn!("failed to read gcloud configuration: {}", err);
                return ResolvedCredentials {
                    credentials: Credentials::config_error(),
                    expires_at: None,
                };
            }
        };

        let Some(project_id) = config.project().map(str::to_string) else {
            warn!("gcloud configuration has no active project");
            return ResolvedCredentials {
                credentials: Credentials::config_error(),
                expires_at: None,
            };
        };
        let region_id = config.region().unwrap_or_default().to_string();

        let credentials = match config.access_token() {
            Some(token) => Credentials {
                access_token: token.to_string(),
                project_id,
                region_id,
                config_error: 0,
                login_error: 0,
            },
            None => {
                warn!("gcloud returned no access token for project {}", project_id);
                Credentials::login_error(project_id, region_id)
            }
        };

        ResolvedCredentials {
            credentials,
            expires_at: config.token_expiry(),
        }
    }
}

struct CachedEntry {
    resolved: ResolvedCredentials,
    fetched_at: Instant,
}

impl CachedEntry {
    fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        if self.fetched_at.elapsed() >= ttl {
            return false;
        }
        match self.resolved.expires_at {
            Some(expiry) => expiry - chrono::Duration::seconds(EXPIRY_MARGIN_SECS) > now,
            None => true,
        }
    }
}

/// Credential cache owned by the server process.
///
/// Only usable credentials are cached, so a fixed gcloud configuration is
/// picked up on the next request. The lock is never held while resolving.
pub struct CredentialCache {
    provider: Arc<dyn CredentialProvider>,
    ttl: Duration,
    entry: RwLock<Option<CachedEntry>>,
}

impl CredentialCache {
    pub fn new(provider: Arc<dyn CredentialProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            entry: RwLock::new(None),
        }
    }

    /// Current credentials, including error flags.
    pub async fn get(&self) -> Credentials {
        {
            let guard = self.entry.read().await;
            if let Some(entry) = guard.as_ref() {
                if entry.is_fresh(self.ttl, Utc::now()) {
                    return entry.resolved.credentials.clone();
                }
            }
        }

        debug!("refreshing cached credentials");
        let resolved = self.provider.resolve().await;
        let credentials = resolved.credentials.clone();
        let mut guard = self.entry.write().await;
        *guard = if credentials.is_usable() {
            Some(CachedEntry {
                resolved,
                fetched_at: Instant::now(),
            })
        } else {
            None
        };
        credentials
    }

    /// Credentials suitable for calling the storage API.
    pub async fn require(&self) -> Result<Credentials, CredentialError> {
        let credentials = self.get().await;
        if credentials.config_error == 1 {
            return Err(CredentialError::NotConfigured);
        }
        if !credentials.is_usable() {
            return Err(CredentialError::NotLoggedIn);
        }
        Ok(credentials)
    }

    /// Drop the cached entry so the next request resolves again.
    pub async fn invalidate(&self) {
        self.entry.write().await.take();
    }
}
