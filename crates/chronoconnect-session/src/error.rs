//! Error types for the session core.
//!
//! Each component has its own error enum; [`SessionError`] wraps them and
//! maps every failure onto the user-facing [`ErrorKind`] taxonomy.

use chronoconnect_ai::AiError;
use chronoconnect_common::Notification;

use crate::chat::ChatLinkState;
use crate::protocol::BrokerError;

/// User-facing failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PermissionDenied,
    DeviceUnavailable,
    PolicyDisallowed,
    /// Recovered automatically by re-registering.
    IdentityCollision,
    /// Scoped to one call or chat link.
    TransportError,
    /// Fatal to the whole session. Reported once, never retried.
    LibraryLoadFailure,
}

impl ErrorKind {
    /// Notification title for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "Permission Denied",
            Self::DeviceUnavailable => "Device Unavailable",
            Self::PolicyDisallowed => "Disallowed by Policy",
            Self::IdentityCollision => "Identity Collision",
            Self::TransportError => "Connection Error",
            Self::LibraryLoadFailure => "Service Unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    DeviceUnavailable(String),

    #[error("{0}")]
    PolicyDisallowed(String),

    #[error("capture failed: {0}")]
    Capture(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("rendezvous service could not be loaded: {0}")]
    LibraryLoad(String),

    #[error("no identity has been assigned yet")]
    NotReady,

    #[error("a call is already active")]
    Busy,

    #[error("call failed: {0}")]
    Call(BrokerError),

    #[error("data connection failed: {0}")]
    Data(BrokerError),

    #[error("track replacement failed: {0}")]
    Replace(BrokerError),

    #[error("identity collision persisted after {0} attempts")]
    CollisionRetriesExhausted(u32),

    #[error("{0}")]
    Broker(BrokerError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("chat link cannot go from {from:?} to {to:?}")]
    InvalidTransition {
        from: ChatLinkState,
        to: ChatLinkState,
    },

    #[error("chat link is not open")]
    NotOpen,

    #[error("chat send failed: {0}")]
    Send(BrokerError),
}

/// A document the user tried to attach to a chat message.
///
/// Not part of the connection taxonomy: it never touches the session, so
/// it carries its own notification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("{name} is not a .txt or .md file")]
    InvalidType { name: String },

    #[error("could not read {name}: {reason}")]
    Read { name: String, reason: String },
}

impl DocumentError {
    pub fn to_notification(&self) -> Notification {
        match self {
            Self::InvalidType { .. } => {
                Notification::error("Invalid File Type", "Please select a .txt or .md file.")
            }
            Self::Read { .. } => Notification::error(
                "File Read Error",
                "An error occurred while reading the file.",
            ),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("no summarizer is configured")]
    Unavailable,

    #[error(transparent)]
    Failed(#[from] AiError),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Summary(#[from] SummaryError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Media(MediaError::PermissionDenied(_)) => ErrorKind::PermissionDenied,
            Self::Media(MediaError::PolicyDisallowed(_)) => ErrorKind::PolicyDisallowed,
            Self::Media(MediaError::DeviceUnavailable(_) | MediaError::Capture(_)) => {
                ErrorKind::DeviceUnavailable
            }
            Self::Transport(TransportError::LibraryLoad(_)) => ErrorKind::LibraryLoadFailure,
            Self::Transport(TransportError::Broker(e)) if e.kind.is_collision() => {
                ErrorKind::IdentityCollision
            }
            Self::Transport(_) | Self::Chat(_) | Self::Summary(_) => ErrorKind::TransportError,
        }
    }

    /// Wrap this error for display: title is the kind, body the reason.
    pub fn to_notification(&self) -> Notification {
        match self.kind() {
            ErrorKind::IdentityCollision => {
                Notification::warning(self.kind().label(), self.to_string())
            }
            kind => Notification::error(kind.label(), self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::BrokerErrorKind;

    #[test]
    fn media_errors_map_to_their_kinds() {
        let denied = SessionError::from(MediaError::PermissionDenied("camera blocked".into()));
        assert_eq!(denied.kind(), ErrorKind::PermissionDenied);

        let policy = SessionError::from(MediaError::PolicyDisallowed("iframe".into()));
        assert_eq!(policy.kind(), ErrorKind::PolicyDisallowed);

        let capture = SessionError::from(MediaError::Capture("boom".into()));
        assert_eq!(capture.kind(), ErrorKind::DeviceUnavailable);
    }

    #[test]
    fn library_load_is_its_own_kind() {
        let err = SessionError::from(TransportError::LibraryLoad("missing".into()));
        assert_eq!(err.kind(), ErrorKind::LibraryLoadFailure);
    }

    #[test]
    fn collision_is_a_warning_not_an_error() {
        let err = SessionError::from(TransportError::Broker(BrokerError::new(
            BrokerErrorKind::UnavailableId,
            "taken",
        )));
        let n = err.to_notification();
        assert_eq!(n.title, "Identity Collision");
        assert!(!n.is_error());
    }

    #[test]
    fn document_errors_have_their_own_titles() {
        let invalid = DocumentError::InvalidType {
            name: "slides.pdf".into(),
        };
        assert_eq!(invalid.to_notification().title, "Invalid File Type");

        let read = DocumentError::Read {
            name: "notes.txt".into(),
            reason: "stream did not contain valid UTF-8".into(),
        };
        let n = read.to_notification();
        assert_eq!(n.title, "File Read Error");
        assert!(n.is_error());
    }

    #[test]
    fn notification_carries_reason() {
        let err = SessionError::from(TransportError::Call(BrokerError::new(
            BrokerErrorKind::PeerUnavailable,
            "Could not connect to peer bob",
        )));
        let n = err.to_notification();
        assert_eq!(n.title, "Connection Error");
        assert_eq!(
            n.body,
            "call failed: peer-unavailable: Could not connect to peer bob"
        );
    }
}
