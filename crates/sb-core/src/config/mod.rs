//! Configuration management for SSHBridge

mod settings;
pub mod serde_utils;

pub use settings::{BridgeConfig, ConfigFile, TransferConfig};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sshbridge")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Get the default credentials file path
pub fn default_credentials_path() -> PathBuf {
    default_config_dir().join("credentials.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

/// Resolve the effective configuration.
///
/// An explicit path must exist and parse. The default path is optional; a
/// broken default file is reported and replaced by defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    let default_path = default_config_path();
    if !default_path.exists() {
        tracing::debug!("Using default configuration");
        return Ok(ConfigFile::default());
    }

    Ok(load_config(&default_path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
        ConfigFile::default()
    }))
}
