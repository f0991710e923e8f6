//! Configuration validation.
//!
//! Each section has its own check; all errors are collected into a single
//! `ConfigError::ValidationError`.

mod helpers;


use chronoconnect_common::ConfigError;

use crate::schema::ChronoConnectConfig;
use helpers::{validate_range, validate_range_f64};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &ChronoConnectConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_transport(&mut errors, config);
    validate_chat(&mut errors, config);
    validate_ai(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_transport(errors: &mut Vec<String>, config: &ChronoConnectConfig) {
    let t = &config.transport;
    validate_range(errors, "transport.collision_backoff_ms", t.collision_backoff_ms, 100, 60_000);
    validate_range(errors, "transport.max_collision_retries", t.max_collision_retries, 1, 100);
    validate_range(errors, "transport.event_buffer", t.event_buffer, 8, 4096);
}

fn validate_chat(errors: &mut Vec<String>, config: &ChronoConnectConfig) {
    if config.chat.timestamp_format.trim().is_empty() {
        errors.push("chat.timestamp_format must not be empty".into());
    }
}

fn validate_ai(errors: &mut Vec<String>, config: &ChronoConnectConfig) {
    let ai = &config.ai;
    validate_range(errors, "ai.max_tokens", ai.max_tokens, 64, 8192);
    validate_range_f64(errors, "ai.temperature", ai.temperature, 0.0, 2.0);
    if matches!(&ai.model, Some(m) if m.trim().is_empty()) {
        errors.push("ai.model must not be blank when set".into());
    }
}
