//! Tests for TOML config loading, creation, and path resolution.

use super::template::default_config_toml;
use super::*;
use chronoconnect_common::ConfigError;
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let err = load_from_path(Path::new("/tmp/nonexistent_chronoconnect_config.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound(_)));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[transport]
collision_backoff_ms = 250

[chat]
connect_on_call = false
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.transport.collision_backoff_ms, 250);
    assert!(!config.chat.connect_on_call);
    // Defaults preserved
    assert_eq!(config.transport.max_collision_retries, 5);
    assert!(config.media.share_audio);
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}

#[test]
fn out_of_range_values_still_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[ai]\nmax_tokens = 1\n").unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.ai.max_tokens, 1);
}

#[test]
fn create_default_config_writes_parseable_template() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    create_default_config(&path).unwrap();

    let config = load_from_path(&path).unwrap();
    assert!(config.media.auto_acquire_camera);
    assert_eq!(config.ai.max_tokens, 512);
}

#[test]
fn template_parses_to_defaults() {
    let config = parse_str(&default_config_toml()).unwrap();
    assert!(crate::validation::validate(&config).is_ok());
}

#[test]
fn default_path_ends_with_app_dir() {
    if let Ok(path) = default_config_path() {
        assert!(path.ends_with("chronoconnect/config.toml"));
    }
}
