use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Top-level error for the binary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("session error: {0}")]
    Session(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("collision_backoff_ms must be > 0".into());
        assert_eq!(
            err.to_string(),
            "config validation error: collision_backoff_ms must be > 0"
        );
    }

    #[test]
    fn app_error_from_config() {
        let config_err = ConfigError::ParseError("bad toml".into());
        let app_err: AppError = config_err.into();
        assert!(matches!(app_err, AppError::Config(_)));
        assert!(app_err.to_string().contains("bad toml"));
    }

    #[test]
    fn app_error_session_display() {
        let err = AppError::Session("Service Unavailable: rendezvous unreachable".into());
        assert_eq!(
            err.to_string(),
            "session error: Service Unavailable: rendezvous unreachable"
        );
    }
}
