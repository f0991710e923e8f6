//! Wire-level types shared with the rendezvous service and the remote peer.
//!
//! Chat payloads ride the data channel as JSON. Broker errors carry the
//! rendezvous library's typed reason strings.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Chat payload
// ---------------------------------------------------------------------------

/// A chat message as sent over the data channel: `{"text": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub text: String,
}

impl ChatPayload {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({ "text": self.text })
    }

    /// Decode a payload; anything without a string `text` field is rejected.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

// ---------------------------------------------------------------------------
// Broker errors
// ---------------------------------------------------------------------------

/// Typed reason attached to a rendezvous error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrokerErrorKind {
    /// The requested identity is already taken. Recovered by re-registering.
    UnavailableId,
    PeerUnavailable,
    Webrtc,
    Network,
    ServerError,
    SocketError,
    SocketClosed,
    Disconnected,
    InvalidId,
    InvalidKey,
    SslUnavailable,
    BrowserIncompatible,
}

impl BrokerErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnavailableId => "unavailable-id",
            Self::PeerUnavailable => "peer-unavailable",
            Self::Webrtc => "webrtc",
            Self::Network => "network",
            Self::ServerError => "server-error",
            Self::SocketError => "socket-error",
            Self::SocketClosed => "socket-closed",
            Self::Disconnected => "disconnected",
            Self::InvalidId => "invalid-id",
            Self::InvalidKey => "invalid-key",
            Self::SslUnavailable => "ssl-unavailable",
            Self::BrowserIncompatible => "browser-incompatible",
        }
    }

    pub fn is_collision(&self) -> bool {
        matches!(self, Self::UnavailableId)
    }

    /// Errors scoped to one call or data link; the registration survives.
    pub fn is_per_call(&self) -> bool {
        matches!(self, Self::PeerUnavailable | Self::Webrtc)
    }

    /// Errors that invalidate the registration. Never retried automatically.
    pub fn is_fatal(&self) -> bool {
        !self.is_collision() && !self.is_per_call()
    }
}

impl fmt::Display for BrokerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error reported by the rendezvous service or one of its links.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct BrokerError {
    pub kind: BrokerErrorKind,
    pub message: String,
}

impl BrokerError {
    pub fn new(kind: BrokerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
