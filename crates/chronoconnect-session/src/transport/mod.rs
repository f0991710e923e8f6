//! Peer transport: identity, calls, data links, and recovery.
//!
//! The rendezvous service sits behind the [`Broker`] seam. Everything the
//! broker reports is funnelled through one signal channel and applied by
//! [`SessionTransport::handle_signal`], so state only changes on the task
//! that owns the transport.

mod loopback;
mod manager;
mod playback;
mod types;


pub use crate::error::TransportError;
pub use loopback::{LoopbackBroker, LoopbackStats};
pub use manager::SessionTransport;
pub use playback::{AudioOutput, AudioPlayback, NullAudioOutput};
pub use types::{
    Broker, BrokerEvent, DataConnection, DataLink, DataLinkEvent, IncomingCall, MediaConnection,
    MediaLink, MediaLinkEvent, PeerHandle, TransportConfig, TransportEvent, TransportSignal,
};
