//! Core TOML config loading: read from a path or the platform default.

use std::path::Path;

use chronoconnect_common::ConfigError;
use tracing::{info, warn};

use super::paths::{create_default_config, default_config_path};
use crate::schema::ChronoConnectConfig;
use crate::validation;

/// Parse config from TOML text. Missing fields take their defaults.
pub fn parse_str(content: &str) -> Result<ChronoConnectConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))
}

/// Load config from a specific TOML file path.
///
/// Validation failures are logged and the parsed config is returned as-is;
/// callers that need a hard failure run [`validation::validate`] themselves.
pub fn load_from_path(path: &Path) -> Result<ChronoConnectConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("failed to read {}: {e}", path.display())))?;
    let config = parse_str(&content)?;

    if let Err(e) = validation::validate(&config) {
        warn!(path = %path.display(), "config validation warning: {e}");
    }

    info!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Load config from the platform-specific default path.
///
/// On Linux: `~/.config/chronoconnect/config.toml`
/// On macOS: `~/Library/Application Support/chronoconnect/config.toml`
///
/// If the file does not exist, a commented default is written and defaults
/// are returned.
pub fn load_default() -> Result<ChronoConnectConfig, ConfigError> {
    let path = default_config_path()?;

    match load_from_path(&path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) => {
            info!(path = %path.display(), "no config found, creating default");
            create_default_config(&path)?;
            Ok(ChronoConnectConfig::default())
        }
        Err(e) => Err(e),
    }
}
