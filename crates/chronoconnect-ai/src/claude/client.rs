//! Claude API client struct, request building, and response parsing.

use reqwest::header::{HeaderMap, HeaderValue};

use crate::{AiError, AiResponse, Message, Role, TokenUsage};

use super::config::{AuthMethod, ClaudeConfig};

pub(crate) const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub(crate) const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude API client.
pub struct ClaudeClient {
    pub(crate) config: ClaudeConfig,
    pub(crate) http: reqwest::Client,
}

impl ClaudeClient {
    pub fn new(config: ClaudeConfig) -> Result<Self, AiError> {
        Ok(Self {
            config,
            http: crate::http_client()?,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Build auth headers for the configured auth method.
    pub(crate) fn auth_headers(&self) -> Result<HeaderMap, AiError> {
        let invalid = |e: reqwest::header::InvalidHeaderValue| {
            AiError::NotConfigured(format!("invalid Claude credential: {e}"))
        };

        let mut headers = HeaderMap::new();
        match self.config.auth_method {
            AuthMethod::ApiKey => {
                headers.insert(
                    "x-api-key",
                    HeaderValue::from_str(&self.config.token).map_err(invalid)?,
                );
            }
            AuthMethod::OAuth => {
                headers.insert(
                    "authorization",
                    HeaderValue::from_str(&format!("Bearer {}", self.config.token))
                        .map_err(invalid)?,
                );
            }
        }
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        Ok(headers)
    }

    /// Build the JSON request body for the Messages API.
    pub(crate) fn build_request_body(&self, messages: &[Message]) -> serde_json::Value {
        let msgs: Vec<_> = messages
            .iter()
            .filter_map(|msg| {
                let role = match msg.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => return None, // system is separate in Claude API
                };
                Some(serde_json::json!({ "role": role, "content": msg.content }))
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": msgs,
        });

        if let Some(system) = messages.iter().find(|m| m.role == Role::System) {
            body["system"] = serde_json::json!(system.content);
        }

        body
    }

    /// Parse a Messages API response; text blocks are concatenated.
    pub(crate) fn parse_response(&self, json: serde_json::Value) -> Result<AiResponse, AiError> {
        let blocks = json["content"]
            .as_array()
            .ok_or_else(|| AiError::ParseError("no content in response".to_string()))?;

        let content = blocks
            .iter()
            .filter(|b| b["type"] == "text")
            .filter_map(|b| b["text"].as_str())
            .collect::<String>();

        let usage = TokenUsage {
            input_tokens: json["usage"]["input_tokens"].as_u64().unwrap_or(0),
            output_tokens: json["usage"]["output_tokens"].as_u64().unwrap_or(0),
        };

        Ok(AiResponse { content, usage })
    }
}
