//! AiClient trait implementation for ClaudeClient.

use async_trait::async_trait;
use tracing::debug;

use crate::{request_error, status_error, AiClient, AiError, AiResponse, Message};

use super::client::{ClaudeClient, ANTHROPIC_API_URL};

#[async_trait]
impl AiClient for ClaudeClient {
    async fn send_message(&self, messages: &[Message]) -> Result<AiResponse, AiError> {
        let body = self.build_request_body(messages);

        debug!(model = %self.config.model, "Claude API request");

        let response = self
            .http
            .post(ANTHROPIC_API_URL)
            .headers(self.auth_headers()?)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AiError::ParseError(e.to_string()))?;

        self.parse_response(json)
    }
}
