//! AiClient trait implementation for GeminiClient.

use async_trait::async_trait;
use tracing::debug;

use crate::{request_error, status_error, AiClient, AiError, AiResponse, Message};

use super::client::GeminiClient;

#[async_trait]
impl AiClient for GeminiClient {
    async fn send_message(&self, messages: &[Message]) -> Result<AiResponse, AiError> {
        let body = self.build_request_body(messages);
        let url = self.api_url();

        debug!(model = %self.config.model, "Gemini API request");

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header("x-goog-api-key", &self.config.api_key)
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
