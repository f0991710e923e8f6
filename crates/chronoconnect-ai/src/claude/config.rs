//! Claude API client configuration.

use std::fmt;

use crate::AiError;

/// How the client authenticates with the Claude API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Anthropic API key (`x-api-key` header).
    ApiKey,
    /// OAuth bearer token (`Authorization: Bearer`).
    OAuth,
}

/// Claude API client configuration.
#[derive(Clone)]
pub struct ClaudeConfig {
    pub token: String,
    pub auth_method: AuthMethod,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl fmt::Debug for ClaudeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaudeConfig")
            .field("auth_method", &self.auth_method)
            .field("token", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl ClaudeConfig {
    pub const DEFAULT_MODEL: &'static str = "claude-sonnet-4-20250514";

    pub fn new(token: impl Into<String>, auth_method: AuthMethod) -> Self {
        Self {
            token: token.into(),
            auth_method,
            model: Self::DEFAULT_MODEL.to_string(),
            max_tokens: 512,
            temperature: 0.3,
        }
    }

    /// Create config from the environment.
    ///
    /// Resolution order:
    /// 1. `ANTHROPIC_API_KEY` (API key auth)
    /// 2. `CLAUDE_CODE_OAUTH_TOKEN` (OAuth auth)
    pub fn from_env() -> Result<Self, AiError> {
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            return Ok(Self::new(key, AuthMethod::ApiKey));
        }
        if let Ok(token) = std::env::var("CLAUDE_CODE_OAUTH_TOKEN") {
            return Ok(Self::new(token, AuthMethod::OAuth));
        }
        Err(AiError::NotConfigured(
            "Claude API not configured. Set ANTHROPIC_API_KEY or CLAUDE_CODE_OAUTH_TOKEN.".into(),
        ))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}
