//! Sync configuration
//!
//! Settings, API servers and subscribed repositories are read from a TOML
//! file, `~/.local/share/github-sync/config.toml` unless another path is given.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::types::{ApiServer, GITHUB_API_BASE_URI, GITHUB_SERVER_LABEL, TrackedRepository};

/// Environment variable consulted when a server has no token configured
pub const TOKEN_ENV_VAR: &str = "GITHUB_SYNC_TOKEN";

/// Tunables of the sync engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Fetch open pull requests authored by the viewer
    pub query_authored_prs: bool,
    /// Fetch open issues authored by the viewer
    pub query_authored_issues: bool,
    /// Number of accumulated nodes that triggers a flush to the store
    pub flush_threshold: usize,
    /// Queries in flight per server
    pub max_concurrent_queries: usize,
    pub request_timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            query_authored_prs: true,
            query_authored_issues: true,
            flush_threshold: 2000,
            max_concurrent_queries: 2,
            request_timeout_secs: 30,
        }
    }
}

impl SyncSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// `[[servers]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub label: String,
    #[serde(default = "default_api_base_uri")]
    pub api_base_uri: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Name of an environment variable holding the token
    #[serde(default)]
    pub auth_token_env: Option<String>,
}

fn default_api_base_uri() -> String {
    GITHUB_API_BASE_URI.to_string()
}

impl ServerConfig {
    /// Resolve the token: inline value, then `auth_token_env`, then `fallback_token`
    pub fn to_api_server(&self, fallback_token: Option<&str>) -> ApiServer {
        let token = self
            .auth_token
            .clone()
            .or_else(|| {
                self.auth_token_env
                    .as_deref()
                    .and_then(|name| std::env::var(name).ok())
            })
            .or_else(|| fallback_token.map(str::to_string))
            .filter(|t| !t.is_empty());
        ApiServer::new(self.label.clone(), self.api_base_uri.clone(), token)
    }
}

/// Complete configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub settings: SyncSettings,
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    #[serde(default)]
    pub repositories: Vec<TrackedRepository>,
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Configuration file could not be read
    IoError(String),
    /// Configuration file is not valid TOML for this schema
    ParseError(String),
    /// Two servers share a label
    DuplicateServer(String),
    /// A repository refers to a server that is not configured
    UnknownServer(String),
    /// An API base URI is not an http(s) URL
    InvalidUri(String),
    /// A numeric setting is out of range
    InvalidSetting(String),
    /// No home directory to resolve the default path against
    NoConfigDirectory,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(msg) => write!(f, "IO error: {}", msg),
            Self::ParseError(msg) => write!(f, "Invalid configuration: {}", msg),
            Self::DuplicateServer(label) => write!(f, "Server '{}' is configured twice", label),
            Self::UnknownServer(label) => write!(f, "Server '{}' is not configured", label),
            Self::InvalidUri(uri) => write!(f, "Invalid API base URI: '{}'", uri),
            Self::InvalidSetting(msg) => write!(f, "Invalid setting: {}", msg),
            Self::NoConfigDirectory => write!(f, "Unable to determine home directory"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl SyncConfig {
    /// Read and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Like [`SyncConfig::load`], but a missing file yields the defaults
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig =
            toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settings.flush_threshold == 0 {
            return Err(ConfigError::InvalidSetting(
                "flush_threshold must be greater than zero".to_string(),
            ));
        }
        if self.settings.max_concurrent_queries == 0 {
            return Err(ConfigError::InvalidSetting(
                "max_concurrent_queries must be greater than zero".to_string(),
            ));
        }

        let mut labels = HashSet::new();
        if self.servers.is_empty() {
            labels.insert(GITHUB_SERVER_LABEL);
        }
        for server in &self.servers {
            if !labels.insert(server.label.as_str()) {
                return Err(ConfigError::DuplicateServer(server.label.clone()));
            }
            let uri = url::Url::parse(&server.api_base_uri)
                .map_err(|_| ConfigError::InvalidUri(server.api_base_uri.clone()))?;
            if !matches!(uri.scheme(), "http" | "https") || uri.host_str().is_none() {
                return Err(ConfigError::InvalidUri(server.api_base_uri.clone()));
            }
        }

        if let Some(repo) = self
            .repositories
            .iter()
            .find(|r| !labels.contains(r.server.as_str()))
        {
            return Err(ConfigError::UnknownServer(repo.server.clone()));
        }
        Ok(())
    }

    /// API servers with their tokens resolved. Without any configured server
    /// the public GitHub server is used.
    pub fn api_servers(&self, fallback_token: Option<&str>) -> Vec<ApiServer> {
        if self.servers.is_empty() {
            return vec![ApiServer::github(
                fallback_token.map(str::to_string).filter(|t| !t.is_empty()),
            )];
        }
        self.servers
            .iter()
            .map(|s| s.to_api_server(fallback_token))
            .collect()
    }
}

/// Get the default configuration file path
///
/// Returns `~/.local/share/github-sync/config.toml` on Unix-like systems
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home_dir = dirs::home_dir().ok_or(ConfigError::NoConfigDirectory)?;

    #[cfg(target_os = "macos")]
    let config_dir = home_dir.join("Library/Application Support/github-sync");

    #[cfg(windows)]
    let config_dir = home_dir.join("AppData/Roaming/github-sync");

    #[cfg(not(any(target_os = "macos", windows)))]
    let config_dir = home_dir.join(".local/share/github-sync");

    Ok(config_dir.join("config.toml"))
}
