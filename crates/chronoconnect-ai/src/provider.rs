//! Provider selection: build an `AiClient` for the configured backend.

use std::sync::Arc;

use tracing::info;

use crate::{AiClient, AiError, ClaudeClient, ClaudeConfig, GeminiClient, GeminiConfig};

/// Which hosted model family to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Claude,
    Gemini,
}

/// Everything needed to build a client besides credentials.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub provider: Provider,
    /// `None` uses the provider's default model.
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            model: None,
            max_tokens: 512,
            temperature: 0.3,
        }
    }
}

/// Build a client for `settings`, reading credentials from the environment.
pub fn client_from_env(settings: &ProviderSettings) -> Result<Arc<dyn AiClient>, AiError> {
    let client: Arc<dyn AiClient> = match settings.provider {
        Provider::Claude => {
            let mut config = ClaudeConfig::from_env()?
                .with_max_tokens(settings.max_tokens)
                .with_temperature(settings.temperature);
            if let Some(model) = &settings.model {
                config = config.with_model(model.clone());
            }
            let client = ClaudeClient::new(config)?;
            info!(model = client.model(), "using Claude for summaries");
            Arc::new(client)
        }
        Provider::Gemini => {
            let mut config = GeminiConfig::from_env()?
                .with_max_tokens(settings.max_tokens)
                .with_temperature(settings.temperature);
            if let Some(model) = &settings.model {
                config = config.with_model(model.clone());
            }
            let client = GeminiClient::new(config)?;
            info!(model = client.model(), "using Gemini for summaries");
            Arc::new(client)
        }
    };
    Ok(client)
}
