//! Gemini API client configuration.

use crate::AiError;

/// Gemini API client configuration.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl GeminiConfig {
    pub const DEFAULT_MODEL: &'static str = "gemini-2.0-flash";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: Self::DEFAULT_MODEL.to_string(),
            max_tokens: 512,
            temperature: 0.3,
        }
    }

    /// Create config from `GEMINI_API_KEY` (or `GOOGLE_API_KEY`).
    pub fn from_env() -> Result<Self, AiError> {
        std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .map(Self::new)
            .map_err(|_| {
                AiError::NotConfigured(
                    "Gemini API not configured. Set GEMINI_API_KEY or GOOGLE_API_KEY.".into(),
                )
            })
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
