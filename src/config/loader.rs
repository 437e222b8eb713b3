use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::types::Config;
use crate::entities::EntityCache;
use crate::model::{ModelError, Namespace};

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl Config {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/slicekit/config.toml` on Unix, or the platform
    /// equivalent via `dirs::config_dir()`. Falls back to the current
    /// directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("slicekit").join("config.toml")
    }

    /// Loads configuration from the default config file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from `path`.
    ///
    /// - If the file doesn't exist, returns `Config::default()`.
    /// - Otherwise parses it as TOML and validates.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - The entity cache namespace is a valid namespace
    /// - The generic failure message is not empty
    /// - The log filter parses as an `EnvFilter` directive
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(err) = Namespace::parse(&self.runtime.entities_namespace) {
            return Err(ConfigError::ValidationError {
                message: format!("runtime.entities_namespace: {}", err),
            });
        }

        if self.pages.failure_message.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "pages.failure_message must not be empty".to_string(),
            });
        }

        if let Err(err) = EnvFilter::try_new(&self.logging.filter) {
            return Err(ConfigError::ValidationError {
                message: format!("logging.filter '{}': {}", self.logging.filter, err),
            });
        }

        Ok(())
    }

    /// Entity cache mounted at the configured namespace.
    pub fn entity_cache(&self) -> Result<EntityCache, ModelError> {
        Ok(EntityCache::new(Namespace::parse(
            &self.runtime.entities_namespace,
        )?))
    }
}
