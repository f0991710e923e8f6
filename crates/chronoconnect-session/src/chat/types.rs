//! Chat configuration, messages, link states, and events.

use std::fmt::Write;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::identity::PeerId;
use crate::transport::DataLinkEvent;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Open a chat link to the same peer whenever we dial.
    pub connect_on_call: bool,
    /// `chrono` format string for message timestamps.
    pub timestamp_format: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            connect_on_call: true,
            timestamp_format: "%-I:%M %p".into(),
        }
    }
}

/// Format `at` with `format`, falling back to `HH:MM` if the format string
/// is not understood.
pub(crate) fn format_timestamp(at: DateTime<Local>, format: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", at.format(format)).is_err() {
        out.clear();
        let _ = write!(out, "{}", at.format("%H:%M"));
    }
    out
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    Local,
    Remote,
}

impl ChatSender {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Local => "You",
            Self::Remote => "Them",
        }
    }
}

/// One entry of the chat history. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: ChatSender,
    pub text: String,
    /// Local receipt (or send) time, already formatted.
    pub timestamp: String,
    /// `false` for local messages that never left this endpoint.
    pub delivered: bool,
}

impl ChatMessage {
    pub fn local(text: impl Into<String>, timestamp: impl Into<String>, delivered: bool) -> Self {
        Self::build(ChatSender::Local, text.into(), timestamp.into(), delivered)
    }

    pub fn remote(text: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self::build(ChatSender::Remote, text.into(), timestamp.into(), true)
    }

    fn build(sender: ChatSender, text: String, timestamp: String, delivered: bool) -> Self {
        Self {
            id: chronoconnect_common::new_id(),
            sender,
            text,
            timestamp,
            delivered,
        }
    }

    /// `"<label> (<timestamp>): <text>"`
    pub fn transcript_line(&self) -> String {
        format!("{} ({}): {}", self.sender.label(), self.timestamp, self.text)
    }
}

// ---------------------------------------------------------------------------
// Link state
// ---------------------------------------------------------------------------

/// Lifecycle of one chat link. `Closed` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatLinkState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
}

impl ChatLinkState {
    pub fn can_transition_to(self, next: ChatLinkState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Connecting)
                | (Self::Connecting, Self::Open)
                | (Self::Idle | Self::Connecting | Self::Open, Self::Closed)
        )
    }
}

// ---------------------------------------------------------------------------
// Signals and events
// ---------------------------------------------------------------------------

/// A data link event tagged with the link it came from.
#[derive(Debug)]
pub struct ChatSignal {
    pub link_id: u64,
    pub event: DataLinkEvent,
}

#[derive(Debug, Clone)]
pub enum ChatEvent {
    Connected { remote: PeerId },
    Message(ChatMessage),
    Disconnected { remote: PeerId },
    Failed { remote: PeerId, error: ChatError },
}
