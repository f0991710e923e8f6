//! Broker seam, connection handles, configuration, and events.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::TransportError;
use crate::identity::PeerId;
use crate::media::{CaptureStream, MediaTrack};
use crate::protocol::BrokerError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Wait before re-registering after an identity collision.
    pub collision_backoff: Duration,
    /// Consecutive collisions tolerated before giving up.
    pub max_collision_retries: u32,
    /// Capacity of the internal signal channel.
    pub event_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            collision_backoff: Duration::from_secs(1),
            max_collision_retries: 5,
            event_buffer: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// Broker seam
// ---------------------------------------------------------------------------

/// A rendezvous service able to issue identities and broker connections.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Register with the service. The identity (or a collision error)
    /// arrives later on the returned event receiver.
    ///
    /// An `Err` means the service itself cannot be used at all.
    async fn open(
        &self,
    ) -> Result<(Arc<dyn PeerHandle>, mpsc::Receiver<BrokerEvent>), TransportError>;
}

/// One registration with the rendezvous service.
#[async_trait]
pub trait PeerHandle: Send + Sync {
    /// Dial `remote`, offering `stream`. The call is established once the
    /// remote answers, which shows up as a remote stream on the connection.
    async fn call(&self, remote: &PeerId, stream: CaptureStream)
        -> Result<MediaConnection, BrokerError>;

    /// Open a data link to `remote`.
    async fn connect(&self, remote: &PeerId) -> Result<DataConnection, BrokerError>;

    /// Drop the registration. The identity is released.
    fn destroy(&self);
}

/// An inbound call waiting for an answer.
pub trait IncomingCall: Send {
    fn caller(&self) -> &PeerId;

    /// Accept the call, sending `stream` back to the caller.
    fn answer(self: Box<Self>, stream: CaptureStream) -> MediaConnection;

    fn decline(self: Box<Self>);
}

/// Events raised by a registration.
pub enum BrokerEvent {
    Open(PeerId),
    Call(Box<dyn IncomingCall>),
    Connection(DataConnection),
    Error(BrokerError),
}

impl fmt::Debug for BrokerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(id) => f.debug_tuple("Open").field(id).finish(),
            Self::Call(call) => f.debug_tuple("Call").field(call.caller()).finish(),
            Self::Connection(conn) => f.debug_tuple("Connection").field(&conn.remote).finish(),
            Self::Error(e) => f.debug_tuple("Error").field(e).finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// The media half of a call.
#[async_trait]
pub trait MediaLink: Send + Sync {
    /// Swap the transmitted video track in place. `None` sends no video.
    async fn replace_video_track(&self, track: Option<MediaTrack>) -> Result<(), BrokerError>;

    /// The video track currently being transmitted.
    fn outbound_video(&self) -> Option<MediaTrack>;

    /// Hang up. Closing twice is harmless.
    fn close(&self);
}

#[derive(Debug, Clone)]
pub enum MediaLinkEvent {
    /// The remote answered and its media is flowing.
    RemoteStream(CaptureStream),
    Closed,
    Error(BrokerError),
}

pub struct MediaConnection {
    pub remote: PeerId,
    pub link: Box<dyn MediaLink>,
    pub events: mpsc::Receiver<MediaLinkEvent>,
}

/// A reliable ordered message link to one peer.
#[async_trait]
pub trait DataLink: Send + Sync {
    async fn send(&self, payload: serde_json::Value) -> Result<(), BrokerError>;

    fn close(&self);
}

#[derive(Debug, Clone)]
pub enum DataLinkEvent {
    Open,
    Data(serde_json::Value),
    Closed,
    Error(BrokerError),
}

pub struct DataConnection {
    pub remote: PeerId,
    pub link: Box<dyn DataLink>,
    pub events: mpsc::Receiver<DataLinkEvent>,
}

// ---------------------------------------------------------------------------
// Call session
// ---------------------------------------------------------------------------

/// The active call. Exists only between dial/answer and hangup/error.
pub(crate) struct CallSession {
    pub id: u64,
    pub remote: PeerId,
    pub link: Box<dyn MediaLink>,
    /// `true` once the remote side has answered.
    pub established: bool,
    pub pump: JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// Signals and events
// ---------------------------------------------------------------------------

/// Raw inputs from background tasks, tagged so stale ones can be dropped.
#[derive(Debug)]
pub enum TransportSignal {
    Broker { generation: u64, event: BrokerEvent },
    Media { call_id: u64, event: MediaLinkEvent },
    RemoteAudioEnded { call_id: u64 },
    RestartDue { generation: u64 },
}

/// What a signal meant, for the controller.
pub enum TransportEvent {
    IdentityReady(PeerId),
    /// Re-registration is scheduled; the old identity is gone. A call that
    /// was up at the time has been closed and is named in `dropped_call`.
    IdentityCollision {
        attempt: u32,
        dropped_call: Option<PeerId>,
    },
    IncomingCall(Box<dyn IncomingCall>),
    InboundData(DataConnection),
    CallEstablished { remote: PeerId },
    CallEnded { remote: PeerId },
    /// The call was torn down by an error.
    CallFailed { remote: PeerId, error: TransportError },
    /// A per-call error arrived with no call to end.
    PeerError(BrokerError),
    /// The registration is gone and will not be retried.
    Fatal(TransportError),
}

impl fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdentityReady(id) => f.debug_tuple("IdentityReady").field(id).finish(),
            Self::IdentityCollision {
                attempt,
                dropped_call,
            } => f
                .debug_struct("IdentityCollision")
                .field("attempt", attempt)
                .field("dropped_call", dropped_call)
                .finish(),
            Self::IncomingCall(call) => f.debug_tuple("IncomingCall").field(call.caller()).finish(),
            Self::InboundData(conn) => f.debug_tuple("InboundData").field(&conn.remote).finish(),
            Self::CallEstablished { remote } => f
                .debug_struct("CallEstablished")
                .field("remote", remote)
                .finish(),
            Self::CallEnded { remote } => {
                f.debug_struct("CallEnded").field("remote", remote).finish()
            }
            Self::CallFailed { remote, error } => f
                .debug_struct("CallFailed")
                .field("remote", remote)
                .field("error", error)
                .finish(),
            Self::PeerError(e) => f.debug_tuple("PeerError").field(e).finish(),
            Self::Fatal(e) => f.debug_tuple("Fatal").field(e).finish(),
        }
    }
}
