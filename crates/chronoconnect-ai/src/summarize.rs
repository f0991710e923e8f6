//! Chat transcript summarization.
//!
//! The transcript arrives pre-rendered as `"<label> (<time>): <text>"`
//! lines. An empty or whitespace-only model reply is replaced by
//! [`SUMMARY_FALLBACK`]; transport and API failures are returned as errors.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{AiClient, AiError, Message};

/// Returned when the model produced no usable summary.
pub const SUMMARY_FALLBACK: &str =
    "The AI could not produce a summary. This might be due to the chat content or model limitations.";

const SUMMARY_PROMPT: &str = "You are an AI expert specializing in summarizing chat histories. \
Please provide a concise summary of the chat history below, focusing on the key topics discussed. \
The summary should be no more than three sentences.";

/// Turns a chat transcript into a short synopsis.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, transcript: &str) -> Result<String, AiError>;
}

/// [`Summarizer`] backed by any [`AiClient`].
pub struct ChatSummarizer {
    client: Arc<dyn AiClient>,
}

impl ChatSummarizer {
    pub fn new(client: Arc<dyn AiClient>) -> Self {
        Self { client }
    }

    fn build_messages(transcript: &str) -> Vec<Message> {
        vec![
            Message::system(SUMMARY_PROMPT),
            Message::user(format!("Chat History:\n{transcript}")),
        ]
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(&self, transcript: &str) -> Result<String, AiError> {
        let messages = Self::build_messages(transcript);
        let response = self.client.send_message(&messages).await?;

        let summary = response.content.trim();
        if summary.is_empty() {
            warn!("model returned no summary text");
            return Ok(SUMMARY_FALLBACK.to_string());
        }

        debug!(tokens = response.usage.total_tokens(), "summary produced");
        Ok(summary.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AiResponse, Role, TokenUsage};
    use std::sync::Mutex;

    struct CannedClient {
        reply: Result<String, String>,
        seen: Mutex<Vec<Message>>,
    }

    impl CannedClient {
        fn new(reply: Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(String::from).map_err(String::from),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AiClient for CannedClient {
        async fn send_message(&self, messages: &[Message]) -> Result<AiResponse, AiError> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            match &self.reply {
                Ok(content) => Ok(AiResponse {
                    content: content.clone(),
                    usage: TokenUsage::default(),
                }),
                Err(msg) => Err(AiError::ApiError(msg.clone())),
            }
        }
    }

    #[tokio::test]
    async fn returns_trimmed_model_output() {
        let client = CannedClient::new(Ok("  They planned a trip.\n"));
        let summarizer = ChatSummarizer::new(client.clone());

        let summary = summarizer.summarize("You (3:04 PM): hi").await.unwrap();
        assert_eq!(summary, "They planned a trip.");

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen[0].role, Role::System);
        assert!(seen[0].content.contains("no more than three sentences"));
        assert!(seen[1].content.ends_with("You (3:04 PM): hi"));
    }

    #[tokio::test]
    async fn empty_output_uses_fallback() {
        let summarizer = ChatSummarizer::new(CannedClient::new(Ok("   ")));
        let summary = summarizer.summarize("Them (1:00 PM): yo").await.unwrap();
        assert_eq!(summary, SUMMARY_FALLBACK);
    }

    #[tokio::test]
    async fn client_failure_is_propagated() {
        let summarizer = ChatSummarizer::new(CannedClient::new(Err("quota exceeded")));
        let err = summarizer.summarize("You (1:00 PM): hi").await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }
}
