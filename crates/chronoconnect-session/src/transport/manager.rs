//! Session transport: owns the registration, the active call, and remote
//! audio playback.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::TransportError;
use crate::identity::PeerId;
use crate::media::{CaptureStream, MediaTrack};
use crate::protocol::BrokerError;

use super::playback::{AudioOutput, RemotePlayback};
use super::types::{
    Broker, BrokerEvent, CallSession, DataConnection, IncomingCall, MediaConnection,
    MediaLinkEvent, PeerHandle, TransportConfig, TransportEvent, TransportSignal,
};

// ---------------------------------------------------------------------------
// Session Transport
// ---------------------------------------------------------------------------

/// Peer connection lifecycle against a rendezvous [`Broker`].
///
/// Background tasks only forward raw events as [`TransportSignal`]s; every
/// state change happens in [`handle_signal`](Self::handle_signal) or one of
/// the `&mut self` operations.
pub struct SessionTransport {
    config: TransportConfig,
    broker: Arc<dyn Broker>,
    audio: Arc<dyn AudioOutput>,
    peer: Option<Arc<dyn PeerHandle>>,
    identity: Option<PeerId>,
    /// Bumped whenever the registration is torn down.
    generation: u64,
    /// Consecutive identity collisions since the last successful open.
    collisions: u32,
    broker_pump: Option<JoinHandle<()>>,
    restart: Option<JoinHandle<()>>,
    call: Option<CallSession>,
    next_call_id: u64,
    playback: Option<RemotePlayback>,
    signal_tx: mpsc::Sender<TransportSignal>,
}

impl SessionTransport {
    pub fn new(
        config: TransportConfig,
        broker: Arc<dyn Broker>,
        audio: Arc<dyn AudioOutput>,
    ) -> (Self, mpsc::Receiver<TransportSignal>) {
        let (signal_tx, signal_rx) = mpsc::channel(config.event_buffer.max(1));
        let transport = Self {
            config,
            broker,
            audio,
            peer: None,
            identity: None,
            generation: 0,
            collisions: 0,
            broker_pump: None,
            restart: None,
            call: None,
            next_call_id: 0,
            playback: None,
            signal_tx,
        };
        (transport, signal_rx)
    }

    pub fn identity(&self) -> Option<&PeerId> {
        self.identity.as_ref()
    }

    pub fn has_call(&self) -> bool {
        self.call.is_some()
    }

    pub fn is_established(&self) -> bool {
        self.call.as_ref().is_some_and(|c| c.established)
    }

    pub fn call_remote(&self) -> Option<&PeerId> {
        self.call.as_ref().map(|c| &c.remote)
    }

    /// The video track the active call is transmitting.
    pub fn outbound_video(&self) -> Option<MediaTrack> {
        self.call.as_ref().and_then(|c| c.link.outbound_video())
    }

    /// Register with the rendezvous service. The identity arrives later as
    /// [`TransportEvent::IdentityReady`]. A no-op while registered.
    pub async fn start(&mut self) -> Result<(), TransportError> {
        if self.peer.is_some() {
            return Ok(());
        }

        let (peer, events) = self.broker.open().await?;
        let generation = self.generation;
        let tx = self.signal_tx.clone();
        self.broker_pump = Some(tokio::spawn(async move {
            let mut events = events;
            while let Some(event) = events.recv().await {
                if tx
                    .send(TransportSignal::Broker { generation, event })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }));
        self.peer = Some(peer);
        debug!(generation, "registration requested");
        Ok(())
    }

    /// Apply one background signal.
    pub async fn handle_signal(&mut self, signal: TransportSignal) -> Option<TransportEvent> {
        match signal {
            TransportSignal::Broker { generation, event } => {
                if generation != self.generation {
                    debug!(generation, current = self.generation, ?event, "dropping stale broker event");
                    return None;
                }
                self.handle_broker_event(event)
            }
            TransportSignal::Media { call_id, event } => self.handle_link_event(call_id, event),
            TransportSignal::RemoteAudioEnded { call_id } => {
                if self.playback.as_ref().is_some_and(|p| p.call_id == call_id) {
                    self.release_playback();
                }
                None
            }
            TransportSignal::RestartDue { generation } => {
                if generation != self.generation || self.peer.is_some() {
                    return None;
                }
                self.restart = None;
                info!(generation, "re-registering after identity collision");
                match self.start().await {
                    Ok(()) => None,
                    Err(e) => {
                        error!(error = %e, "re-registration failed");
                        Some(TransportEvent::Fatal(e))
                    }
                }
            }
        }
    }

    fn handle_broker_event(&mut self, event: BrokerEvent) -> Option<TransportEvent> {
        match event {
            BrokerEvent::Open(id) => {
                info!(peer_id = %id, "identity ready");
                self.identity = Some(id.clone());
                self.collisions = 0;
                Some(TransportEvent::IdentityReady(id))
            }
            BrokerEvent::Call(call) => {
                info!(caller = %call.caller(), "incoming call");
                Some(TransportEvent::IncomingCall(call))
            }
            BrokerEvent::Connection(conn) => {
                info!(remote = %conn.remote, "incoming data connection");
                Some(TransportEvent::InboundData(conn))
            }
            BrokerEvent::Error(err) if err.kind.is_collision() => Some(self.recover_collision(err)),
            BrokerEvent::Error(err) if err.kind.is_per_call() => {
                warn!(error = %err, "per-call broker error");
                match self.take_call() {
                    Some(call) => {
                        call.link.close();
                        Some(TransportEvent::CallFailed {
                            remote: call.remote,
                            error: TransportError::Call(err),
                        })
                    }
                    None => Some(TransportEvent::PeerError(err)),
                }
            }
            BrokerEvent::Error(err) => {
                error!(error = %err, "fatal broker error");
                self.teardown();
                Some(TransportEvent::Fatal(TransportError::Broker(err)))
            }
        }
    }

    /// Destroy the registration and schedule exactly one re-registration.
    fn recover_collision(&mut self, err: BrokerError) -> TransportEvent {
        let dropped_call = self.teardown();
        self.collisions += 1;
        let attempt = self.collisions;

        if attempt > self.config.max_collision_retries {
            error!(attempt, "identity collision retries exhausted");
            return TransportEvent::Fatal(TransportError::CollisionRetriesExhausted(
                self.config.max_collision_retries,
            ));
        }

        warn!(attempt, error = %err, backoff = ?self.config.collision_backoff, "identity collision");
        let generation = self.generation;
        let delay = self.config.collision_backoff;
        let tx = self.signal_tx.clone();
        self.restart = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(TransportSignal::RestartDue { generation }).await;
        }));
        TransportEvent::IdentityCollision {
            attempt,
            dropped_call,
        }
    }

    fn handle_link_event(&mut self, call_id: u64, event: MediaLinkEvent) -> Option<TransportEvent> {
        let Some(call) = self.call.as_mut().filter(|c| c.id == call_id) else {
            debug!(call_id, "dropping event for finished call");
            return None;
        };

        match event {
            MediaLinkEvent::RemoteStream(stream) => {
                let remote = call.remote.clone();
                let newly_established = !call.established;
                call.established = true;

                self.release_playback();
                self.playback = RemotePlayback::start(
                    self.audio.as_ref(),
                    call_id,
                    &remote,
                    &stream,
                    self.signal_tx.clone(),
                );

                if newly_established {
                    info!(call_id, %remote, "call established");
                    Some(TransportEvent::CallEstablished { remote })
                } else {
                    None
                }
            }
            MediaLinkEvent::Closed => {
                let call = self.take_call()?;
                info!(call_id, remote = %call.remote, "call closed by remote");
                Some(TransportEvent::CallEnded {
                    remote: call.remote,
                })
            }
            MediaLinkEvent::Error(err) => {
                let call = self.take_call()?;
                warn!(call_id, remote = %call.remote, error = %err, "call error");
                call.link.close();
                Some(TransportEvent::CallFailed {
                    remote: call.remote,
                    error: TransportError::Call(err),
                })
            }
        }
    }

    /// Dial `remote` with `outbound` (pass an empty stream when there is no
    /// local media). Establishment is reported later.
    pub async fn call(
        &mut self,
        remote: &PeerId,
        outbound: CaptureStream,
    ) -> Result<(), TransportError> {
        if self.call.is_some() {
            return Err(TransportError::Busy);
        }
        let peer = match (&self.peer, &self.identity) {
            (Some(peer), Some(_)) => Arc::clone(peer),
            _ => return Err(TransportError::NotReady),
        };

        let conn = peer
            .call(remote, outbound)
            .await
            .map_err(TransportError::Call)?;
        let call_id = self.install_call(conn, false);
        info!(call_id, %remote, "dialing");
        Ok(())
    }

    /// Answer an inbound call with `outbound`. The call counts as
    /// established immediately.
    pub fn answer(
        &mut self,
        call: Box<dyn IncomingCall>,
        outbound: CaptureStream,
    ) -> Result<PeerId, TransportError> {
        if self.call.is_some() {
            call.decline();
            return Err(TransportError::Busy);
        }
        let conn = call.answer(outbound);
        let remote = conn.remote.clone();
        let call_id = self.install_call(conn, true);
        info!(call_id, %remote, "answered call");
        Ok(remote)
    }

    pub fn decline(&self, call: Box<dyn IncomingCall>) {
        info!(caller = %call.caller(), "declining call");
        call.decline();
    }

    /// Swap the transmitted video track. Succeeds trivially with no call.
    pub async fn replace_outgoing_video_track(
        &self,
        track: Option<MediaTrack>,
    ) -> Result<(), TransportError> {
        let Some(call) = &self.call else {
            return Ok(());
        };
        debug!(call_id = call.id, track = ?track.as_ref().map(MediaTrack::label), "replacing video track");
        call.link
            .replace_video_track(track)
            .await
            .map_err(TransportError::Replace)
    }

    /// Open a data link to `remote` through the current registration.
    pub async fn connect_data(&self, remote: &PeerId) -> Result<DataConnection, TransportError> {
        let peer = match (&self.peer, &self.identity) {
            (Some(peer), Some(_)) => Arc::clone(peer),
            _ => return Err(TransportError::NotReady),
        };
        peer.connect(remote).await.map_err(TransportError::Data)
    }

    /// Hang up the active call. Returns `false` if there was none.
    pub fn close(&mut self) -> bool {
        match self.take_call() {
            Some(call) => {
                info!(call_id = call.id, remote = %call.remote, "closing call");
                call.link.close();
                true
            }
            None => false,
        }
    }

    /// Close everything and release the registration.
    pub fn shutdown(&mut self) {
        self.close();
        self.teardown();
        info!("transport shut down");
    }

    fn install_call(&mut self, conn: MediaConnection, established: bool) -> u64 {
        self.next_call_id += 1;
        let call_id = self.next_call_id;

        let tx = self.signal_tx.clone();
        let mut events = conn.events;
        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if tx
                    .send(TransportSignal::Media { call_id, event })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        self.call = Some(CallSession {
            id: call_id,
            remote: conn.remote,
            link: conn.link,
            established,
            pump,
        });
        call_id
    }

    /// Detach the active call and its playback without closing the link.
    fn take_call(&mut self) -> Option<CallSession> {
        let call = self.call.take()?;
        call.pump.abort();
        if self.playback.as_ref().is_some_and(|p| p.call_id == call.id) {
            self.release_playback();
        }
        Some(call)
    }

    fn release_playback(&mut self) {
        if let Some(playback) = self.playback.take() {
            playback.release();
        }
    }

    /// Drop the registration; events from it are ignored from now on.
    /// Drop the registration. Returns the remote of a call that was still
    /// up, since it cannot outlive the identity it was placed through.
    fn teardown(&mut self) -> Option<PeerId> {
        let dropped = self.take_call().map(|call| {
            warn!(call_id = call.id, remote = %call.remote, "dropping call with registration");
            call.link.close();
            call.remote
        });
        if let Some(pump) = self.broker_pump.take() {
            pump.abort();
        }
        if let Some(restart) = self.restart.take() {
            restart.abort();
        }
        if let Some(peer) = self.peer.take() {
            peer.destroy();
        }
        self.identity = None;
        self.generation += 1;
        dropped
    }
}

impl Drop for SessionTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}
