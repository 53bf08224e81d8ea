use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};

/// Largest `saveFile` body accepted unless configured otherwise (100 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    pub token: Option<String>,
    pub storage_url: Option<String>,
    pub gcloud_bin: String,
    pub command_timeout: Duration,
    pub login_timeout: Duration,
    pub credentials_ttl: Duration,
    pub max_body_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Google Cloud Storage proxy for notebook frontends")]
pub struct Args {
    /// Host to bind to (overrides GCS_PLUGIN_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides GCS_PLUGIN_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Base URL the notebook server is mounted at (overrides GCS_PLUGIN_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Token required on plugin routes (overrides GCS_PLUGIN_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Storage API endpoint, skipping gcloud lookup (overrides GCS_PLUGIN_STORAGE_URL)
    #[arg(long)]
    pub storage_url: Option<String>,

    /// Path of the gcloud executable (overrides GCS_PLUGIN_GCLOUD_BIN)
    #[arg(long)]
    pub gcloud_bin: Option<String>,

    /// Timeout for gcloud configuration commands (overrides GCS_PLUGIN_COMMAND_TIMEOUT_SECS)
    #[arg(long)]
    pub command_timeout_secs: Option<u64>,

    /// Timeout for the interactive login (overrides GCS_PLUGIN_LOGIN_TIMEOUT_SECS)
    #[arg(long)]
    pub login_timeout_secs: Option<u64>,

    /// Maximum age of cached credentials (overrides GCS_PLUGIN_CREDENTIALS_TTL_SECS)
    #[arg(long)]
    pub credentials_ttl_secs: Option<u64>,

    /// Largest accepted `saveFile` body in bytes (overrides GCS_PLUGIN_MAX_BODY_BYTES)
    #[arg(long)]
    pub max_body_bytes: Option<usize>,
}

/// Read `key`, falling back to `default` when unset.
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse())
    }

    /// CLI values win over environment values, which win over defaults.
    pub fn merge(args: Args) -> Result<Self> {
        let env_host = env::var("GCS_PLUGIN_HOST").unwrap_or_else(|_| "127.0.0.1".into());
        let env_port = env_or("GCS_PLUGIN_PORT", 8888u16)?;
        let env_base = env::var("GCS_PLUGIN_BASE_URL").unwrap_or_else(|_| "/".into());
        let env_gcloud = env::var("GCS_PLUGIN_GCLOUD_BIN").unwrap_or_else(|_| "gcloud".into());
        let env_command_timeout = env_or("GCS_PLUGIN_COMMAND_TIMEOUT_SECS", 30u64)?;
        let env_login_timeout = env_or("GCS_PLUGIN_LOGIN_TIMEOUT_SECS", 300u64)?;
        let env_ttl = env_or("GCS_PLUGIN_CREDENTIALS_TTL_SECS", 300u64)?;
        let env_max_body = env_or("GCS_PLUGIN_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?;

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            base_url: args.base_url.unwrap_or(env_base),
            token: args.token.or_else(|| env_opt("GCS_PLUGIN_TOKEN")),
            storage_url: args.storage_url.or_else(|| env_opt("GCS_PLUGIN_STORAGE_URL")),
            gcloud_bin: args.gcloud_bin.unwrap_or(env_gcloud),
            command_timeout: Duration::from_secs(
                args.command_timeout_secs.unwrap_or(env_command_timeout),
            ),
            login_timeout: Duration::from_secs(
                args.login_timeout_secs.unwrap_or(env_login_timeout),
            ),
            credentials_ttl: Duration::from_secs(args.credentials_ttl_secs.unwrap_or(env_ttl)),
            max_body_bytes: args.max_body_bytes.unwrap_or(env_max_body),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
