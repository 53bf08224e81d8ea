//! Defines routes for the notebook storage plugin.
//!
//! ## Structure
//! - **Storage endpoints** (under `{base_url}/gcs-jupyter-plugin/api/storage/`)
//!   - `GET  listBuckets`, `listFiles`, `loadFile`, `downloadFile`
//!   - `POST createFolder`, `saveFile`, `deleteFile`, `renameFile`
//!
//! - **Plugin endpoints** (under `{base_url}/gcs-jupyter-plugin/`)
//!   - `GET  credentials`, `getGcpServiceUrls`
//!   - `POST log`, `login`
//!
//! - **Health** (`GET /healthz`, unauthenticated)

use crate::{
    handlers::{
        health_handlers::healthz,
        plugin_handlers::{get_credentials, get_service_urls, post_log, post_login},
        storage_handlers::{
            create_folder, delete_file, download_file, list_buckets, list_files, load_file,
            rename_file, save_file,
        },
    },
    middleware::{logging_middleware, require_token},
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

pub const PLUGIN_NAMESPACE: &str = "gcs-jupyter-plugin";

/// Mount point of the plugin below the notebook server's base URL.
pub fn plugin_prefix(base_url: &str) -> String {
    let base = base_url.trim_matches('/');
    if base.is_empty() {
        format!("/{}", PLUGIN_NAMESPACE)
    } else {
        format!("/{}/{}", base, PLUGIN_NAMESPACE)
    }
}

fn plugin_routes(max_body_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/credentials", get(get_credentials))
        .route("/getGcpServiceUrls", get(get_service_urls))
        .route("/log", post(post_log))
        .route("/login", post(post_login))
        .route("/api/storage/listBuckets", get(list_buckets))
        .route("/api/storage/listFiles", get(list_files))
        .route("/api/storage/loadFile", get(load_file))
        .route("/api/storage/createFolder", post(create_folder))
        .route(
            "/api/storage/saveFile",
            post(save_file).layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .route("/api/storage/deleteFile", post(delete_file))
        .route("/api/storage/renameFile", post(rename_file))
        .route("/api/storage/downloadFile", get(download_file))
}

/// Build the complete application router.
///
/// Plugin routes require the configured token; `/healthz` does not.
/// `saveFile` bodies may be up to `max_body_bytes`; other routes keep axum's default limit.
pub fn routes(state: AppState, base_url: &str, max_body_bytes: usize) -> Router {
    let plugin = plugin_routes(max_body_bytes).route_layer(middleware::from_fn_with_state(
        state.clone(),
        require_token,
    ));

    Router::new()
        .route("/healthz", get(healthz))
        .nest(&plugin_prefix(base_url), plugin)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}
