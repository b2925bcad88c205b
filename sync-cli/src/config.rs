//! Configuration and on-disk state for the rowsync CLI.
//!
//! Settings are read from a TOML file (default: `rowsync.toml` in the data
//! directory). The session itself is kept next to it as `session.json`.

use anyhow::{Context, Result};
use rowsync_client::{HttpTransport, RetryStrategy, SyncConfig};
use serde::Deserialize;
use serde_json::Value as Json;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the data directory when `--config` is not given.
pub const CONFIG_FILE: &str = "rowsync.toml";

/// Saved session state.
pub const SESSION_FILE: &str = "session.json";

/// Root configuration for the CLI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Authority endpoint configuration.
    #[serde(default)]
    pub api: ApiConfig,
    /// Sync behavior.
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Authority endpoint configuration.
#[derive(Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL the endpoints hang off (default: http://127.0.0.1:8080/1/datastores).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token sent with every request.
    #[serde(default)]
    pub token: Option<String>,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Sync behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncSettings {
    /// Push attempts per transaction (default: 1).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Long-poll timeout for `await` in seconds (default: 90).
    #[serde(default = "default_await_timeout_secs")]
    pub await_timeout_secs: u64,
    /// Pull and re-run the edit after a conflicted push instead of
    /// resending it (default: false).
    #[serde(default)]
    pub rederive_on_conflict: bool,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/1/datastores".to_string()
}

fn default_max_retries() -> u32 {
    1
}

fn default_await_timeout_secs() -> u64 {
    90
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            await_timeout_secs: default_await_timeout_secs(),
            rederive_on_conflict: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Resolve the configuration for a run.
    ///
    /// An explicit path must exist. Otherwise `rowsync.toml` in the data
    /// directory is used if present, and the defaults if not.
    pub fn resolve(explicit: Option<&Path>, data_dir: &Path) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = data_dir.join(CONFIG_FILE);
                if path.exists() {
                    Self::from_file(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Session settings derived from this configuration.
    pub fn sync_config(&self) -> SyncConfig {
        let strategy = if self.sync.rederive_on_conflict {
            RetryStrategy::Rederive
        } else {
            RetryStrategy::Resend
        };
        let config = SyncConfig::new()
            .with_max_retries(self.sync.max_retries)
            .with_retry_strategy(strategy);
        match &self.api.token {
            Some(token) => config.with_api_token(token),
            None => config,
        }
    }

    /// HTTP transport for the configured authority.
    pub fn transport(&self) -> Result<HttpTransport> {
        let transport = HttpTransport::new(&self.api.base_url)
            .with_context(|| format!("Failed to create HTTP client for {}", self.api.base_url))?;
        Ok(transport.with_await_timeout(Duration::from_secs(self.sync.await_timeout_secs)))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

/// Check if a session file exists.
pub fn session_exists(data_dir: &Path) -> bool {
    data_dir.join(SESSION_FILE).exists()
}

/// Load the saved session JSON.
pub async fn load_session(data_dir: &Path) -> Result<Json> {
    let path = data_dir.join(SESSION_FILE);
    let contents = tokio::fs::read_to_string(&path)
        .await
        .context("No session found. Run 'rowsync init' first.")?;
    serde_json::from_str(&contents).context("Invalid session file")
}

/// Save session JSON to the data directory.
pub async fn save_session(data_dir: &Path, session: &Json) -> Result<()> {
    let path = data_dir.join(SESSION_FILE);
    let contents = serde_json::to_string_pretty(session)?;
    tokio::fs::write(&path, contents)
        .await
        .context("Failed to save session")?;
    set_file_permissions_0600(&path).await?;
    Ok(())
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
