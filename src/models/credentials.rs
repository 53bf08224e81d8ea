//! Ambient cloud credentials handed to the browser and the storage client.

use serde::{Deserialize, Serialize};

/// Credentials resolved from the local gcloud installation.
///
/// `config_error` and `login_error` are `0`/`1` flags because the browser UI
/// compares them numerically.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub project_id: String,
    #[serde(default)]
    pub region_id: String,
    #[serde(default)]
    pub config_error: u8,
    #[serde(default)]
    pub login_error: u8,
}

impl Credentials {
    /// Credentials for a host whose gcloud configuration could not be read.
    pub fn config_error() -> Self {
        Self {
            config_error: 1,
            ..Self::default()
        }
    }

    /// Credentials for a configured host with no usable login.
    pub fn login_error(project_id: String, region_id: String) -> Self {
        Self {
            project_id,
            region_id,
            login_error: 1,
            ..Self::default()
        }
    }

    pub fn is_usable(&self) -> bool {
        self.config_error == 0 && self.login_error == 0 && !self.access_token.is_empty()
    }
}
