//! In-process rendezvous service.
//!
//! Every [`LoopbackBroker`] clone shares one hub, so two transports built
//! from clones of the same broker can find and call each other. Collisions,
//! track replacement failures, and load failures can be injected.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::TransportError;
use crate::identity::PeerId;
use crate::media::{CaptureStream, MediaTrack};
use crate::protocol::{BrokerError, BrokerErrorKind};

use super::types::{
    Broker, BrokerEvent, DataConnection, DataLink, DataLinkEvent, IncomingCall, MediaConnection,
    MediaLink, MediaLinkEvent, PeerHandle,
};

const LINK_BUFFER: usize = 64;

/// Operation counters, for asserting what the transport actually did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopbackStats {
    pub opened: u32,
    pub destroyed: u32,
    pub calls: u32,
    pub connects: u32,
    pub media_closes: u32,
    pub replaces: u32,
}

#[derive(Default)]
struct HubState {
    peers: HashMap<PeerId, mpsc::Sender<BrokerEvent>>,
    pending_collisions: u32,
    replace_failures: u32,
    open_failure: Option<String>,
    stats: LoopbackStats,
}

#[derive(Default)]
struct Hub {
    state: Mutex<HubState>,
}

impl Hub {
    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn unreachable_peer(remote: &PeerId) -> BrokerError {
    BrokerError::new(
        BrokerErrorKind::PeerUnavailable,
        format!("Could not connect to peer {remote}"),
    )
}

// ---------------------------------------------------------------------------
// Broker
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct LoopbackBroker {
    hub: Arc<Hub>,
}

impl LoopbackBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` registrations fail with `unavailable-id`.
    pub fn inject_collisions(&self, count: u32) {
        self.hub.lock().pending_collisions += count;
    }

    /// The next `count` track replacements fail.
    pub fn fail_replacements(&self, count: u32) {
        self.hub.lock().replace_failures += count;
    }

    /// Every registration from now on fails as if the service could not
    /// be loaded.
    pub fn fail_open(&self, reason: impl Into<String>) {
        self.hub.lock().open_failure = Some(reason.into());
    }

    pub fn stats(&self) -> LoopbackStats {
        self.hub.lock().stats
    }

    pub fn is_registered(&self, id: &PeerId) -> bool {
        self.hub.lock().peers.contains_key(id)
    }

    /// Deliver `err` to the registration `id`. Returns `false` if `id` is
    /// not registered.
    pub async fn inject_error(&self, id: &PeerId, err: BrokerError) -> bool {
        let target = self.hub.lock().peers.get(id).cloned();
        match target {
            Some(tx) => tx.send(BrokerEvent::Error(err)).await.is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl Broker for LoopbackBroker {
    async fn open(
        &self,
    ) -> Result<(Arc<dyn PeerHandle>, mpsc::Receiver<BrokerEvent>), TransportError> {
        let (tx, rx) = mpsc::channel(LINK_BUFFER);
        let id = PeerId::generate();
        {
            let mut state = self.hub.lock();
            if let Some(reason) = &state.open_failure {
                return Err(TransportError::LibraryLoad(reason.clone()));
            }
            state.stats.opened += 1;

            if state.pending_collisions > 0 {
                state.pending_collisions -= 1;
                debug!(peer_id = %id, "loopback: injecting identity collision");
                let _ = tx.try_send(BrokerEvent::Error(BrokerError::new(
                    BrokerErrorKind::UnavailableId,
                    format!("ID \"{id}\" is taken"),
                )));
            } else {
                state.peers.insert(id.clone(), tx.clone());
                let _ = tx.try_send(BrokerEvent::Open(id.clone()));
            }
        }

        let peer = LoopbackPeer {
            id,
            hub: Arc::clone(&self.hub),
        };
        Ok((Arc::new(peer), rx))
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

struct LoopbackPeer {
    id: PeerId,
    hub: Arc<Hub>,
}

#[async_trait]
impl PeerHandle for LoopbackPeer {
    async fn call(
        &self,
        remote: &PeerId,
        stream: CaptureStream,
    ) -> Result<MediaConnection, BrokerError> {
        let target = {
            let mut state = self.hub.lock();
            state.stats.calls += 1;
            state.peers.get(remote).cloned()
        };
        let target = target.ok_or_else(|| unreachable_peer(remote))?;

        let (caller_tx, caller_rx) = mpsc::channel(LINK_BUFFER);
        let (callee_tx, callee_rx) = mpsc::channel(LINK_BUFFER);
        let closed = Arc::new(AtomicBool::new(false));

        let caller_link = LoopbackMediaLink::new(
            Arc::clone(&self.hub),
            stream.video_track().cloned(),
            callee_tx.clone(),
            Arc::clone(&closed),
        );
        let incoming = LoopbackIncomingCall {
            caller: self.id.clone(),
            caller_stream: stream,
            hub: Arc::clone(&self.hub),
            caller_tx,
            callee_tx,
            callee_rx,
            closed,
        };

        target
            .send(BrokerEvent::Call(Box::new(incoming)))
            .await
            .map_err(|_| unreachable_peer(remote))?;

        debug!(from = %self.id, to = %remote, "loopback: call offered");
        Ok(MediaConnection {
            remote: remote.clone(),
            link: Box::new(caller_link),
            events: caller_rx,
        })
    }

    async fn connect(&self, remote: &PeerId) -> Result<DataConnection, BrokerError> {
        let target = {
            let mut state = self.hub.lock();
            state.stats.connects += 1;
            state.peers.get(remote).cloned()
        };
        let target = target.ok_or_else(|| unreachable_peer(remote))?;

        let (local_tx, local_rx) = mpsc::channel(LINK_BUFFER);
        let (far_tx, far_rx) = mpsc::channel(LINK_BUFFER);
        let closed = Arc::new(AtomicBool::new(false));

        let local = LoopbackDataLink {
            peer_events: far_tx.clone(),
            closed: Arc::clone(&closed),
        };
        let far = LoopbackDataLink {
            peer_events: local_tx.clone(),
            closed,
        };
        let _ = local_tx.try_send(DataLinkEvent::Open);
        let _ = far_tx.try_send(DataLinkEvent::Open);

        target
            .send(BrokerEvent::Connection(DataConnection {
                remote: self.id.clone(),
                link: Box::new(far),
                events: far_rx,
            }))
            .await
            .map_err(|_| unreachable_peer(remote))?;

        debug!(from = %self.id, to = %remote, "loopback: data link opened");
        Ok(DataConnection {
            remote: remote.clone(),
            link: Box::new(local),
            events: local_rx,
        })
    }

    fn destroy(&self) {
        let mut state = self.hub.lock();
        state.peers.remove(&self.id);
        state.stats.destroyed += 1;
        debug!(peer_id = %self.id, "loopback: registration destroyed");
    }
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

struct LoopbackIncomingCall {
    caller: PeerId,
    caller_stream: CaptureStream,
    hub: Arc<Hub>,
    caller_tx: mpsc::Sender<MediaLinkEvent>,
    callee_tx: mpsc::Sender<MediaLinkEvent>,
    callee_rx: mpsc::Receiver<MediaLinkEvent>,
    closed: Arc<AtomicBool>,
}

impl IncomingCall for LoopbackIncomingCall {
    fn caller(&self) -> &PeerId {
        &self.caller
    }

    fn answer(self: Box<Self>, stream: CaptureStream) -> MediaConnection {
        let call = *self;
        let link = LoopbackMediaLink::new(
            call.hub,
            stream.video_track().cloned(),
            call.caller_tx.clone(),
            Arc::clone(&call.closed),
        );

        if call.closed.load(Ordering::SeqCst) {
            let _ = call.callee_tx.try_send(MediaLinkEvent::Closed);
        } else {
            let _ = call.caller_tx.try_send(MediaLinkEvent::RemoteStream(stream));
            let _ = call
                .callee_tx
                .try_send(MediaLinkEvent::RemoteStream(call.caller_stream));
        }

        MediaConnection {
            remote: call.caller,
            link: Box::new(link),
            events: call.callee_rx,
        }
    }

    fn decline(self: Box<Self>) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.caller_tx.try_send(MediaLinkEvent::Closed);
        }
    }
}

struct LoopbackMediaLink {
    hub: Arc<Hub>,
    outbound: Mutex<Option<MediaTrack>>,
    peer_events: mpsc::Sender<MediaLinkEvent>,
    closed: Arc<AtomicBool>,
}

impl LoopbackMediaLink {
    fn new(
        hub: Arc<Hub>,
        outbound: Option<MediaTrack>,
        peer_events: mpsc::Sender<MediaLinkEvent>,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            hub,
            outbound: Mutex::new(outbound),
            peer_events,
            closed,
        }
    }
}

#[async_trait]
impl MediaLink for LoopbackMediaLink {
    async fn replace_video_track(&self, track: Option<MediaTrack>) -> Result<(), BrokerError> {
        {
            let mut state = self.hub.lock();
            state.stats.replaces += 1;
            if state.replace_failures > 0 {
                state.replace_failures -= 1;
                return Err(BrokerError::new(
                    BrokerErrorKind::Webrtc,
                    "replaceTrack was rejected",
                ));
            }
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::new(
                BrokerErrorKind::Webrtc,
                "connection is closed",
            ));
        }
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = track;
        Ok(())
    }

    fn outbound_video(&self) -> Option<MediaTrack> {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn close(&self) {
        self.hub.lock().stats.media_closes += 1;
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.peer_events.try_send(MediaLinkEvent::Closed);
        }
    }
}

// ---------------------------------------------------------------------------
// Data links
// ---------------------------------------------------------------------------

struct LoopbackDataLink {
    peer_events: mpsc::Sender<DataLinkEvent>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl DataLink for LoopbackDataLink {
    async fn send(&self, payload: serde_json::Value) -> Result<(), BrokerError> {
        let gone = || BrokerError::new(BrokerErrorKind::Network, "data connection is closed");
        if self.closed.load(Ordering::SeqCst) {
            return Err(gone());
        }
        self.peer_events
            .send(DataLinkEvent::Data(payload))
            .await
            .map_err(|_| gone())
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.peer_events.try_send(DataLinkEvent::Closed);
        }
    }
}
