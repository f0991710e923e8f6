use super::types::ChatMessage;

/// Ordered, append-only chat history for one endpoint.
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The whole history as one line per message, for summarization.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(ChatMessage::transcript_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
