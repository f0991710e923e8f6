//! Hosted-model clients for ChronoConnect.
//!
//! Provides Claude and Gemini API clients behind the [`AiClient`] trait,
//! and the chat summarizer built on top of them.

pub mod claude;
pub mod gemini;
pub mod provider;
pub mod summarize;

use async_trait::async_trait;

pub use claude::{ClaudeClient, ClaudeConfig};
pub use gemini::{GeminiClient, GeminiConfig};
pub use provider::{client_from_env, Provider, ProviderSettings};
pub use summarize::{ChatSummarizer, Summarizer, SUMMARY_FALLBACK};

#[async_trait]
pub trait AiClient: Send + Sync {
    async fn send_message(&self, messages: &[Message]) -> Result<AiResponse, AiError>;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone)]
pub struct AiResponse {
    pub content: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Timeout")]
    Timeout,
    #[error("Not configured: {0}")]
    NotConfigured(String),
}

/// Map a non-success HTTP status and body into an [`AiError`].
pub(crate) fn status_error(status: reqwest::StatusCode, body: &str) -> AiError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return AiError::RateLimited;
    }
    if status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status == reqwest::StatusCode::GATEWAY_TIMEOUT
    {
        return AiError::Timeout;
    }
    let text = body.chars().take(200).collect::<String>();
    AiError::ApiError(format!("HTTP {status}: {text}"))
}

/// Map a transport failure from reqwest into an [`AiError`].
pub(crate) fn request_error(err: reqwest::Error) -> AiError {
    if err.is_timeout() {
        AiError::Timeout
    } else {
        AiError::NetworkError(err.to_string())
    }
}

/// Shared HTTP client settings for the provider clients.
pub(crate) fn http_client() -> Result<reqwest::Client, AiError> {
    reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(10))
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .map_err(|e| AiError::NetworkError(format!("failed to build HTTP client: {e}")))
}
