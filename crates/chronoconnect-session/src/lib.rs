//! Peer-to-peer call session core.
//!
//! Four cooperating parts, leaf first:
//!
//! - [`media`]: local camera and screen capture, and which one is live.
//! - [`transport`]: identity, calls, track replacement, and error recovery
//!   against a rendezvous [`Broker`](transport::Broker).
//! - [`chat`]: the text channel carried over the same peer link.
//! - [`controller`]: the state machine tying the three together and
//!   emitting [`SessionEvent`]s for a presentation surface.
//!
//! [`LoopbackBroker`] and [`VirtualDevices`] let two endpoints run
//! in-process without network or hardware.

pub mod chat;
pub mod controller;
pub mod error;
pub mod identity;
pub mod media;
pub mod protocol;
pub mod transport;

pub use chat::{ChatChannel, ChatComposer, ChatConfig, ChatLinkState, ChatMessage, ChatSender};
pub use controller::{
    CallState, Collaborators, Intent, Preview, SessionConfig, SessionController, SessionEvent,
    SessionSnapshot,
};
pub use error::{DocumentError, ErrorKind, SessionError};
pub use identity::PeerId;
pub use media::{
    CaptureDevices, CaptureStream, DeviceOutcome, MediaConfig, MediaKind, MediaManager,
    MediaSource, MediaTrack, ScreenShareOptions, VirtualDevices,
};
pub use protocol::{BrokerError, BrokerErrorKind, ChatPayload};
pub use transport::{
    AudioOutput, Broker, LoopbackBroker, NullAudioOutput, SessionTransport, TransportConfig,
};
