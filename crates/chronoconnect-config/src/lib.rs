//! ChronoConnect configuration.
//!
//! TOML-backed settings for media capture, transport, chat, the summary
//! backend, and logging. Every section uses serde defaults so a partial
//! (or missing) file still yields a usable config.
//!
//! ```rust,no_run
//! use chronoconnect_config::{load_config, config_to_json};
//!
//! let config = load_config(None).expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    AiConfig, AiProvider, ChatConfig, ChronoConnectConfig, LogLevel, LoggingConfig, MediaConfig,
    TransportConfig,
};

use std::path::Path;

use chronoconnect_common::ConfigError;

/// Load config from `path`, or from the platform default location when
/// `path` is `None`.
///
/// An explicit path must exist. The default location is created from the
/// commented template on first run. A config that fails validation is
/// replaced by defaults with a warning.
pub fn load_config(path: Option<&Path>) -> Result<ChronoConnectConfig, ConfigError> {
    let config = match path {
        Some(p) => toml_loader::load_from_path(p)?,
        None => toml_loader::load_default()?,
    };

    match validation::validate(&config) {
        Ok(()) => Ok(config),
        Err(e) => {
            tracing::warn!("{e}; falling back to default config");
            Ok(ChronoConnectConfig::default())
        }
    }
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &ChronoConnectConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let json = config_to_json(&ChronoConnectConfig::default());
        for section in ["media", "transport", "chat", "ai", "logging"] {
            assert!(json.contains(&format!("\"{section}\"")), "missing {section}");
        }
    }

    #[test]
    fn load_config_falls_back_to_defaults_on_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[transport]\nevent_buffer = 0\n[chat]\nconnect_on_call = false\n")
            .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.transport.event_buffer, 256);
        assert!(config.chat.connect_on_call);
    }

    #[test]
    fn load_config_explicit_missing_path_is_an_error() {
        let err = load_config(Some(Path::new("/tmp/chronoconnect_missing/config.toml")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
