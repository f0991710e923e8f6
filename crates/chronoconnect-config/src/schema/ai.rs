//! Summary backend settings.

use serde::{Deserialize, Serialize};

/// Which hosted model summarizes chat transcripts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    Claude,
    #[default]
    Gemini,
}

/// `[ai]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub provider: AiProvider,
    /// Model override. `None` uses the provider's default model.
    pub model: Option<String>,
    /// Response token cap (valid range: 64-8192).
    pub max_tokens: u32,
    /// Sampling temperature (valid range: 0.0-2.0).
    pub temperature: f64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProvider::Gemini,
            model: None,
            max_tokens: 512,
            temperature: 0.3,
        }
    }
}
