//! Plugin endpoints outside the storage surface: credentials, the service
//! URL map, client log forwarding and the gcloud login trigger.

use crate::{services::urls, state::AppState};
use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{Level, debug, error, info, trace, warn};

/// Log level sent by the browser: a Python logging level number or a name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ClientLevel {
    Numeric(u64),
    Named(String),
}

impl ClientLevel {
    pub fn to_level(&self) -> Level {
        match self {
            Self::Numeric(n) if *n >= 40 => Level::ERROR,
            Self::Numeric(n) if *n >= 30 => Level::WARN,
            Self::Numeric(n) if *n >= 20 => Level::INFO,
            Self::Numeric(n) if *n >= 10 => Level::DEBUG,
            Self::Numeric(_) => Level::TRACE,
            Self::Named(name) => match name.to_ascii_lowercase().as_str() {
                "critical" | "fatal" | "error" => Level::ERROR,
                "warning" | "warn" => Level::WARN,
                "debug" => Level::DEBUG,
                "trace" => Level::TRACE,
                _ => Level::INFO,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ClientLogEntry {
    pub level: ClientLevel,
    pub message: String,
}

/// GET `credentials`: the cached credentials with their error flags.
pub async fn get_credentials(State(state): State<AppState>) -> impl IntoResponse {
    let credentials = state.storage.credentials().get().await;
    if credentials.config_error == 1 {
        error!("Error fetching credentials from gcloud");
    }
    Json(credentials)
}

/// GET `getGcpServiceUrls`: endpoint map for the browser.
pub async fn get_service_urls(State(state): State<AppState>) -> impl IntoResponse {
    let url_map = urls::map(state.storage.urls()).await;
    info!("Service URL map: {:?}", url_map);
    Json(url_map)
}

/// POST `log`: re-emit a browser log record under the `client` target.
pub async fn post_log(Json(entry): Json<ClientLogEntry>) -> impl IntoResponse {
    let message = entry.message;
    match entry.level.to_level() {
        Level::ERROR => error!(target: "client", "{}", message),
        Level::WARN => warn!(target: "client", "{}", message),
        Level::INFO => info!(target: "client", "{}", message),
        Level::DEBUG => debug!(target: "client", "{}", message),
        _ => trace!(target: "client", "{}", message),
    }
    Json(json!({ "status": "OK" }))
}

/// POST `login`: run `gcloud auth login` and drop cached credentials on success.
pub async fn post_login(State(state): State<AppState>) -> impl IntoResponse {
    let outcome = match state.gcloud.auth_login().await {
        Ok(true) => {
            state.storage.credentials().invalidate().await;
            "SUCCEEDED"
        }
        Ok(false) => "FAILED",
        Err(err) => {
            error!("gcloud login failed: {}", err);
            "FAILED"
        }
    };
    Json(json!({ "login": outcome }))
}
