//! Shared application state handed to every handler.

use crate::services::{gcloud::GcloudCli, storage_service::StorageService};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Opens per-request storage sessions; owns the credential cache.
    pub storage: StorageService,

    /// Used by the login endpoint.
    pub gcloud: GcloudCli,

    /// Token required on plugin routes; `None` disables the check.
    pub auth_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(storage: StorageService, gcloud: GcloudCli, auth_token: Option<String>) -> Self {
        Self {
            storage,
            gcloud,
            auth_token: auth_token.map(Arc::from),
        }
    }
}
