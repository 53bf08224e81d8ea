//! Narrow interface for invoking the gcloud CLI.
//!
//! Every invocation goes through [`CommandRunner`] with an explicit timeout
//! and captured output, so the rest of the server never spawns processes
//! directly.

use async_trait::async_trait;
use serde::Deserialize;
use std::{collections::HashMap, io, process::Stdio, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished external command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{program}` did not finish within {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
    #[error("`{program}` exited with status {status:?}: {stderr}")]
    Failed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("unexpected output from `{program}`: {reason}")]
    Parse { program: String, reason: String },
}

/// Runs an external program to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError>;
}

/// [`CommandRunner`] backed by `tokio::process`.
///
/// The child is killed when the timeout elapses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        debug!("running {} {}", program, args.join(" "));
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(CommandError::Spawn {
                    program: program.to_string(),
                    source,
                });
            }
            Err(_) => {
                return Err(CommandError::Timeout {
                    program: program.to_string(),
                    timeout,
                });
            }
        };

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// The subset of `gcloud config config-helper --format=json` the server reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GcloudConfig {
    #[serde(default)]
    pub configuration: ConfigurationBlock,
    #[serde(default)]
    pub credential: Option<CredentialBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigurationBlock {
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Properties {
    #[serde(default)]
    pub core: HashMap<String, String>,
    #[serde(default)]
    pub compute: HashMap<String, String>,
    #[serde(default)]
    pub api_endpoint_overrides: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialBlock {
    pub access_token: Option<String>,
    pub token_expiry: Option<String>,
}

impl GcloudConfig {
    pub fn project(&self) -> Option<&str> {
        non_empty(self.configuration.properties.core.get("project"))
    }

    pub fn region(&self) -> Option<&str> {
        non_empty(self.configuration.properties.compute.get("region"))
    }

    pub fn access_token(&self) -> Option<&str> {
        self.credential
            .as_ref()
            .and_then(|c| c.access_token.as_deref())
            .filter(|t| !t.is_empty())
    }

    /// Token expiry as reported by gcloud; unparseable values are ignored.
    pub fn token_expiry(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let raw = self.credential.as_ref()?.token_expiry.as_deref()?;
        chrono::DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&chrono::Utc))
    }

    pub fn endpoint_override(&self, service: &str) -> Option<&str> {
        non_empty(self.configuration.properties.api_endpoint_overrides.get(service))
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

/// Typed front for the gcloud commands the server needs.
#[derive(Clone)]
pub struct GcloudCli {
    runner: Arc<dyn CommandRunner>,
    program: String,
    timeout: Duration,
    login_timeout: Duration,
}

impl GcloudCli {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        program: impl Into<String>,
        timeout: Duration,
        login_timeout: Duration,
    ) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout,
            login_timeout,
        }
    }

    /// Read the active configuration together with a fresh access token.
    pub async fn config_helper(&self) -> Result<GcloudConfig, CommandError> {
        let output = self
            .runner
            .run(
                &self.program,
                &["config", "config-helper", "--format=json"],
                self.timeout,
            )
            .await?;

        if !output.success() {
            return Err(CommandError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }

        serde_json::from_str(&output.stdout).map_err(|err| CommandError::Parse {
            program: self.program.clone(),
            reason: err.to_string(),
        })
    }

    /// Run the interactive `gcloud auth login` flow. Returns whether it exited cleanly.
    pub async fn auth_login(&self) -> Result<bool, CommandError> {
        let output = self
            .runner
            .run(&self.program, &["auth", "login"], self.login_timeout)
            .await?;
        if !output.success() {
            debug!("gcloud auth login failed: {}", output.stderr.trim());
        }
        Ok(output.success())
    }
}
