//! Gemini API client struct, request building, and response parsing.

use crate::{AiError, AiResponse, Message, Role, TokenUsage};

use super::config::GeminiConfig;

pub(crate) const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini API client.
pub struct GeminiClient {
    pub(crate) config: GeminiConfig,
    pub(crate) http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, AiError> {
        Ok(Self {
            config,
            http: crate::http_client()?,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub(crate) fn api_url(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_API_BASE, self.config.model)
    }

    /// Build the JSON request body for the Gemini API.
    pub(crate) fn build_request_body(&self, messages: &[Message]) -> serde_json::Value {
        let contents: Vec<_> = messages
            .iter()
            .filter_map(|msg| {
                let role = match msg.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                    Role::System => return None, // handled via systemInstruction
                };
                Some(serde_json::json!({
                    "role": role,
                    "parts": [{ "text": msg.content }]
                }))
            })
            .collect();

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": self.config.max_tokens,
                "temperature": self.config.temperature,
            }
        });

        if let Some(system) = messages.iter().find(|m| m.role == Role::System) {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{ "text": system.content }]
            });
        }

        body
    }

    /// Parse a Gemini response. A candidate with no text parts yields empty
    /// content, not an error.
    pub(crate) fn parse_response(&self, json: serde_json::Value) -> Result<AiResponse, AiError> {
        let candidates = json["candidates"]
            .as_array()
            .ok_or_else(|| AiError::ParseError("no candidates in response".to_string()))?;

        let content = candidates
            .first()
            .and_then(|c| c["content"]["parts"].as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<String>()
            })
            .unwrap_or_default();

        let usage = TokenUsage {
            input_tokens: json["usageMetadata"]["promptTokenCount"]
                .as_u64()
                .unwrap_or(0),
            output_tokens: json["usageMetadata"]["candidatesTokenCount"]
                .as_u64()
                .unwrap_or(0),
        };

        Ok(AiResponse { content, usage })
    }
}
