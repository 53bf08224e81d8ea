use anyhow::{Context, Result};
use gcs_notebook_proxy::{
    AppState,
    config::AppConfig,
    create_router,
    routes::routes::plugin_prefix,
    services::{
        credentials::{CredentialCache, GcloudCredentialProvider},
        gcloud::{GcloudCli, ProcessRunner},
        gcs::GcsConnector,
        storage_service::StorageService,
        urls::{GcloudUrlResolver, STORAGE_SERVICE_NAME},
    },
};
use std::{collections::HashMap, io::ErrorKind, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Upper bound for a single storage API call.
const STORAGE_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;
    tracing::info!(
        "Starting gcs-notebook-proxy on {} (base url {}, gcloud {})",
        cfg.addr(),
        cfg.base_url,
        cfg.gcloud_bin
    );
    if cfg.token.is_none() {
        tracing::warn!("No token configured; plugin routes are served without authentication");
    }

    // --- External collaborators ---
    let gcloud = GcloudCli::new(
        Arc::new(ProcessRunner),
        cfg.gcloud_bin.clone(),
        cfg.command_timeout,
        cfg.login_timeout,
    );
    let credentials = Arc::new(CredentialCache::new(
        Arc::new(GcloudCredentialProvider::new(gcloud.clone())),
        cfg.credentials_ttl,
    ));
    let mut overrides = HashMap::new();
    if let Some(url) = cfg.storage_url.clone() {
        overrides.insert(STORAGE_SERVICE_NAME.to_string(), url);
    }
    let urls = Arc::new(GcloudUrlResolver::new(gcloud.clone(), overrides));
    let connector =
        Arc::new(GcsConnector::new(STORAGE_REQUEST_TIMEOUT).context("building HTTP client")?);

    // --- Build router ---
    let storage = StorageService::new(credentials, urls, connector);
    let state = AppState::new(storage, gcloud, cfg.token.clone());
    let app = create_router(state, &cfg.base_url, cfg.max_body_bytes);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err).with_context(|| format!("binding {}", addr)),
    };

    tracing::info!(
        "Serving http://{}{}",
        listener.local_addr()?,
        plugin_prefix(&cfg.base_url)
    );
    axum::serve(listener, app).await?;

    Ok(())
}
