//! Configuration loading, validation, and management for the Deep Researcher API.
//!
//! Loads configuration from `~/.deepresearch/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.deepresearch/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Research capability configuration
    #[serde(default)]
    pub research: ResearchConfig,

    /// Embedding model and corpus configuration
    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum accepted request body (uploads included)
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}
fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// Which research capability the loader constructs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchMode {
    /// Degraded mode: deterministic synthetic results, no model
    #[default]
    Placeholder,
    /// Sentence-embedding retrieval over a local corpus
    Embedding,
}

impl std::fmt::Display for ResearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResearchMode::Placeholder => write!(f, "placeholder"),
            ResearchMode::Embedding => write!(f, "embedding"),
        }
    }
}

impl std::str::FromStr for ResearchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "placeholder" | "degraded" => Ok(ResearchMode::Placeholder),
            "embedding" | "local" => Ok(ResearchMode::Embedding),
            other => Err(ConfigError::ValidationError(format!(
                "unknown research mode '{other}' (expected 'placeholder' or 'embedding')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default)]
    pub mode: ResearchMode,

    /// Upper bound on capability construction before it is marked failed
    #[serde(default = "default_init_timeout")]
    pub init_timeout_secs: u64,
}

fn default_init_timeout() -> u64 {
    120
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            mode: ResearchMode::default(),
            init_timeout_secs: default_init_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// HuggingFace repository of the sentence-embedding model
    #[serde(default = "default_repo_id")]
    pub repo_id: String,

    /// Where model files are cached on disk
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Directory of `.txt` / `.md` documents searched in embedding mode
    #[serde(default = "default_corpus_dir")]
    pub corpus_dir: PathBuf,

    /// Number of findings returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_repo_id() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".into()
}
fn default_cache_dir() -> PathBuf {
    AppConfig::config_dir().join("models")
}
fn default_corpus_dir() -> PathBuf {
    AppConfig::config_dir().join("corpus")
}
fn default_top_k() -> usize {
    5
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            repo_id: default_repo_id(),
            cache_dir: default_cache_dir(),
            corpus_dir: default_corpus_dir(),
            top_k: default_top_k(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.deepresearch/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `PORT`: listen port
    /// - `DEEPRESEARCH_HOST`: listen address
    /// - `DEEPRESEARCH_MODE`: `placeholder` or `embedding`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply process environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("PORT must be a port number, got '{port}'"))
            })?;
        }

        if let Some(host) = lookup("DEEPRESEARCH_HOST") {
            self.server.host = host;
        }

        if let Some(mode) = lookup("DEEPRESEARCH_MODE") {
            self.research.mode = mode.parse()?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".deepresearch")
    }

    /// Listen address as `host:port`.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.research.init_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "research.init_timeout_secs must be > 0".into(),
            ));
        }

        if self.model.top_k == 0 {
            return Err(ConfigError::ValidationError("model.top_k must be > 0".into()));
        }

        if self.server.body_limit_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "server.body_limit_bytes must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
