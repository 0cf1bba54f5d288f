use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::IciError;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ici-chat.toml";

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "ICI_CHAT_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }
}

/// How the vault answers `/vault/search`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultSearchMode {
    /// Case-insensitive substring matching over captured text and URLs.
    #[default]
    Text,
    /// Embedding similarity over a per-user flat inner-product index.
    Vector,
}

impl VaultSearchMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" | "lightweight" => Some(Self::Text),
            "vector" => Some(Self::Vector),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Terminate stale listeners on the port before binding.
    pub cleanup_port_on_start: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cleanup_port_on_start: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub search: VaultSearchMode,
    /// Embedding width for the hashing embedder (fastembed fixes its own).
    pub dimension: usize,
    /// Default similarity floor for vector-mode searches.
    pub threshold: f32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            search: VaultSearchMode::Text,
            dimension: 384,
            threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecallConfig {
    pub threshold: f32,
    pub limit: usize,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            limit: 5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub vault: VaultConfig,
    pub recall: RecallConfig,
}

// --- TOML file shape ---

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    environment: Option<Environment>,
    #[serde(default)]
    server: FileServer,
    #[serde(default)]
    vault: FileVault,
    #[serde(default)]
    recall: FileRecall,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileServer {
    host: Option<String>,
    port: Option<u16>,
    cleanup_port_on_start: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileVault {
    search: Option<VaultSearchMode>,
    dimension: Option<usize>,
    threshold: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileRecall {
    threshold: Option<f32>,
    limit: Option<usize>,
}

impl Config {
    /// Load configuration: defaults, then the TOML file (if any), then
    /// environment overrides. A broken file is logged and skipped.
    pub fn load() -> Self {
        let mut config = Self::default();
        if let Some(path) = config_file_path() {
            match Self::read_file(&path) {
                Ok(file) => {
                    tracing::info!("config: loaded {}", path.display());
                    config.apply_file(file);
                }
                Err(e) => tracing::warn!("config: ignoring {}: {e}", path.display()),
            }
        }
        config.apply_env();
        config
    }

    /// Defaults plus environment overrides, no file lookup.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Defaults plus one TOML file, no environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, IciError> {
        let mut config = Self::default();
        config.apply_file(Self::read_file(path)?);
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<FileConfig, IciError> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| IciError::Config(e.to_string()))
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(env) = file.environment {
            self.environment = env;
        }
        if let Some(host) = file.server.host {
            self.server.host = host;
        }
        if let Some(port) = file.server.port {
            self.server.port = port;
        }
        if let Some(cleanup) = file.server.cleanup_port_on_start {
            self.server.cleanup_port_on_start = cleanup;
        }
        if let Some(search) = file.vault.search {
            self.vault.search = search;
        }
        if let Some(dimension) = file.vault.dimension.filter(|d| *d > 0) {
            self.vault.dimension = dimension;
        }
        if let Some(threshold) = file.vault.threshold {
            self.vault.threshold = threshold;
        }
        if let Some(threshold) = file.recall.threshold {
            self.recall.threshold = threshold;
        }
        if let Some(limit) = file.recall.limit.filter(|l| *l > 0) {
            self.recall.limit = limit;
        }
    }

    fn apply_env(&mut self) {
        if let Ok(raw) = env::var("ENVIRONMENT") {
            match Environment::parse(&raw) {
                Some(env) => self.environment = env,
                None => tracing::warn!("config: unknown ENVIRONMENT '{raw}', keeping default"),
            }
        }
        if let Ok(raw) = env::var("PORT") {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => {
                    tracing::warn!("config: invalid PORT '{raw}', keeping {}", self.server.port)
                }
            }
        }
        if let Ok(host) = env::var("ICI_HOST")
            && !host.trim().is_empty()
        {
            self.server.host = host.trim().to_string();
        }
        if let Ok(raw) = env::var("ICI_VAULT_SEARCH") {
            match VaultSearchMode::parse(&raw) {
                Some(mode) => self.vault.search = mode,
                None => tracing::warn!("config: unknown ICI_VAULT_SEARCH '{raw}'"),
            }
        }
        if let Ok(raw) = env::var("ICI_CLEANUP_PORT") {
            self.server.cleanup_port_on_start =
                !matches!(raw.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off");
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn config_file_path() -> Option<PathBuf> {
    if let Ok(explicit) = env::var(CONFIG_PATH_ENV)
        && !explicit.trim().is_empty()
    {
        return Some(PathBuf::from(explicit));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
    default.exists().then_some(default)
}
