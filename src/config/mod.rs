
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Byte prefix read from every file, both at ingest and at answer time.
pub const DEFAULT_PREFIX_BYTES: usize = 800;

/// How many successfully embedded files between progress lines.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 10;

const DEFAULT_EXTENSIONS: &[&str] = &["md", "json"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub embedding_model: String,
    pub chat_model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Root of the documentation tree. Falls back to the current directory
    /// when neither this nor the CLI flag is set.
    pub root_dir: Option<PathBuf>,
    pub prefix_bytes: usize,
    pub extensions: Vec<String>,
    pub progress_interval: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "127.0.0.1".to_string(),
            port: 11434,
            embedding_model: "harald-phi4".to_string(),
            chat_model: "harald-phi4".to_string(),
            timeout_seconds: 600,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            root_dir: None,
            prefix_bytes: DEFAULT_PREFIX_BYTES,
            extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama: OllamaConfig::default(),
            ingest: IngestConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid prefix size: {0} (must be between 1 and 65536 bytes)")]
    InvalidPrefixBytes(usize),
    #[error("Invalid timeout: {0} (must be between 1 and 3600 seconds)")]
    InvalidTimeout(u64),
    #[error("No file extensions configured for ingest")]
    NoExtensions,
    #[error("Invalid progress interval: 0 (must be at least 1)")]
    InvalidProgressInterval,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;

        if self.ingest.prefix_bytes == 0 || self.ingest.prefix_bytes > 65536 {
            return Err(ConfigError::InvalidPrefixBytes(self.ingest.prefix_bytes));
        }

        if self.ingest.extensions.is_empty() {
            return Err(ConfigError::NoExtensions);
        }

        if self.ingest.progress_interval == 0 {
            return Err(ConfigError::InvalidProgressInterval);
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    /// Path of the persisted similarity index.
    #[inline]
    pub fn index_path(&self) -> PathBuf {
        self.base_dir.join("repo.index")
    }

    /// Path of the document metadata list, parallel to the index rows.
    #[inline]
    pub fn metadata_path(&self) -> PathBuf {
        self.base_dir.join("repo.meta.json")
    }
}

impl OllamaConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.chat_model.clone()));
        }

        if self.timeout_seconds == 0 || self.timeout_seconds > 3600 {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        Ok(())
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = dirs::config_dir()
        .ok_or(ConfigError::DirectoryError)?
        .join("docs-rag");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}
