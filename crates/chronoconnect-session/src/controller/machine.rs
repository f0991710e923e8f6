//! The session state machine.

use std::path::Path;
use std::sync::Arc;

use chronoconnect_ai::Summarizer;
use chronoconnect_common::Notification;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::chat::{ChatChannel, ChatEvent, ChatHistory, ChatSignal};
use crate::error::{ErrorKind, SessionError, SummaryError, TransportError};
use crate::identity::PeerId;
use crate::media::{CaptureStream, MediaEvent, MediaKind, MediaManager, MediaTrack};
use crate::transport::{IncomingCall, SessionTransport, TransportEvent, TransportSignal};

use super::types::{
    CallState, Collaborators, Intent, Preview, SessionConfig, SessionEvent, SessionSnapshot,
    Signal, NO_CHAT_TO_SUMMARIZE,
};

const EVENT_BUFFER: usize = 256;

// ---------------------------------------------------------------------------
// Session Controller
// ---------------------------------------------------------------------------

/// Orchestrates one endpoint. Owns the media manager, the transport, and
/// the chat channel, and is the only thing that mutates them.
pub struct SessionController {
    media: MediaManager,
    media_rx: mpsc::Receiver<MediaEvent>,
    transport: SessionTransport,
    transport_rx: mpsc::Receiver<TransportSignal>,
    chat: ChatChannel,
    chat_rx: mpsc::Receiver<ChatSignal>,
    summarizer: Option<Arc<dyn Summarizer>>,
    state: CallState,
    audio_enabled: bool,
    video_enabled: bool,
    event_tx: mpsc::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        collaborators: Collaborators,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (media, media_rx) = MediaManager::new(config.media, collaborators.devices);
        let (transport, transport_rx) = SessionTransport::new(
            config.transport,
            collaborators.broker,
            collaborators.audio,
        );
        let (chat, chat_rx) = ChatChannel::new(config.chat);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        let controller = Self {
            media,
            media_rx,
            transport,
            transport_rx,
            chat,
            chat_rx,
            summarizer: collaborators.summarizer,
            state: CallState::Idle,
            audio_enabled: false,
            video_enabled: false,
            event_tx,
        };
        (controller, event_rx)
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn identity(&self) -> Option<&PeerId> {
        self.transport.identity()
    }

    pub fn media(&self) -> &MediaManager {
        &self.media
    }

    pub fn transport(&self) -> &SessionTransport {
        &self.transport
    }

    pub fn chat_history(&self) -> &ChatHistory {
        self.chat.history()
    }

    pub fn preview(&self) -> Preview {
        Preview::for_source(self.media.live_source(), self.media.camera_permission())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            identity: self.transport.identity().cloned(),
            call_state: self.state,
            chat_messages: self.chat.history().messages().to_vec(),
            chat_link_state: self.chat.state(),
            live_source: self.media.live_source(),
            preview: self.preview(),
            camera_permission: self.media.camera_permission(),
            audio_enabled: self.audio_enabled,
            video_enabled: self.video_enabled,
            sharing: self.media.is_sharing(),
            draft: self.chat.composer().draft().to_string(),
            document: self.chat.composer().document().map(|d| d.name.clone()),
        }
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Acquire the camera once, then register with the rendezvous service.
    ///
    /// `Ready` is reached whether or not the camera was granted. An error is
    /// returned only when the rendezvous service cannot be used at all.
    pub async fn startup(&mut self) -> Result<(), SessionError> {
        self.set_state(CallState::AcquiringMedia).await;

        if let Some(Err(e)) = self.media.acquire_on_startup().await {
            self.report(e).await;
        }
        self.sync_track_flags();
        self.emit_source().await;
        self.set_state(CallState::Ready).await;

        if let Err(e) = self.transport.start().await {
            error!(error = %e, "rendezvous service unavailable");
            self.report(e.clone()).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Wait for the next background signal. Cancel safe.
    pub async fn next_signal(&mut self) -> Option<Signal> {
        tokio::select! {
            Some(event) = self.media_rx.recv() => Some(Signal::Media(event)),
            Some(signal) = self.transport_rx.recv() => Some(Signal::Transport(signal)),
            Some(signal) = self.chat_rx.recv() => Some(Signal::Chat(signal)),
            else => None,
        }
    }

    /// Drive the controller until `Shutdown` arrives or `intents` closes.
    pub async fn run(mut self, mut intents: mpsc::Receiver<Intent>) {
        loop {
            tokio::select! {
                intent = intents.recv() => {
                    let intent = intent.unwrap_or(Intent::Shutdown);
                    if !self.handle_intent(intent).await {
                        break;
                    }
                }
                Some(signal) = self.next_signal() => self.handle_signal(signal).await,
            }
        }
    }

    pub async fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::Media(event) => {
                if self.media.handle_event(event) {
                    self.inform("Screen Sharing Ended", "").await;
                    self.fall_back().await;
                }
            }
            Signal::Transport(signal) => {
                if let Some(event) = self.transport.handle_signal(signal).await {
                    self.on_transport_event(event).await;
                }
                if self.state == CallState::InCall && !self.transport.has_call() {
                    warn!("call vanished under the session, hanging up");
                    self.hang_up(false).await;
                }
            }
            Signal::Chat(signal) => {
                if let Some(event) = self.chat.handle_signal(signal) {
                    self.on_chat_event(event).await;
                }
            }
        }
    }

    /// Apply one user intent. Returns `false` once the session has shut
    /// down.
    pub async fn handle_intent(&mut self, intent: Intent) -> bool {
        debug!(?intent, state = ?self.state, "intent");
        match intent {
            Intent::ToggleAudio => self.toggle(MediaKind::Audio).await,
            Intent::ToggleVideo => self.toggle(MediaKind::Video).await,
            Intent::StartShare => self.start_share().await,
            Intent::StopShare => self.stop_share().await,
            Intent::Call(remote) => self.dial(remote).await,
            Intent::ConnectChat(remote) => self.connect_chat(&remote).await,
            Intent::Hangup => self.end_call().await,
            Intent::SendChat(text) => {
                if let Some(message) = self.chat.send(&text).await {
                    self.emit(SessionEvent::ChatMessage(message)).await;
                }
            }
            Intent::EditDraft(text) => {
                self.chat.composer_mut().set_draft(text);
                self.emit_draft().await;
            }
            Intent::SendDraft => {
                if let Some(message) = self.chat.send_draft().await {
                    self.emit(SessionEvent::ChatMessage(message)).await;
                    self.emit_draft().await;
                }
            }
            Intent::SelectDocument(path) => self.select_document(&path).await,
            Intent::InsertDocument => {
                if self.chat.composer_mut().insert_document() {
                    self.emit_draft().await;
                    self.emit(SessionEvent::DocumentChanged(None)).await;
                }
            }
            Intent::ClearDocument => {
                if self.chat.composer_mut().clear_document() {
                    self.emit(SessionEvent::DocumentChanged(None)).await;
                }
            }
            Intent::Summarize => match self.summarize().await {
                Ok(summary) => self.emit(SessionEvent::Summary(summary)).await,
                Err(e) => {
                    warn!(error = %e, "summarization failed");
                    let note = Notification::error("Summarization Error", format!("Error: {e}"));
                    self.emit(SessionEvent::Notify(note)).await;
                }
            },
            Intent::RetryCamera => self.retry_camera().await,
            Intent::Shutdown => {
                self.shutdown().await;
                return false;
            }
        }
        true
    }

    // -- Calls --------------------------------------------------------------

    async fn dial(&mut self, remote: PeerId) {
        if self.state == CallState::InCall || self.transport.has_call() {
            self.report(TransportError::Busy).await;
            return;
        }

        let outbound = self.outbound_stream();
        match self.transport.call(&remote, outbound).await {
            Ok(()) => {
                if self.chat.config().connect_on_call {
                    self.connect_chat(&remote).await;
                }
            }
            Err(e) => self.report(e).await,
        }
    }

    fn answer(&mut self, call: Box<dyn IncomingCall>) -> Result<PeerId, TransportError> {
        if self.state == CallState::InCall || self.transport.has_call() {
            self.transport.decline(call);
            return Err(TransportError::Busy);
        }
        let outbound = self.outbound_stream();
        self.transport.answer(call, outbound)
    }

    /// Hang up from any state. Stops the share first, closes the call and
    /// the chat link, and leaves the controller `Ready`. Safe to repeat.
    pub async fn end_call(&mut self) {
        self.hang_up(false).await;
    }

    /// `remote_closed` is set when the remote side closed the call, which
    /// is announced even if it never got established.
    async fn hang_up(&mut self, remote_closed: bool) {
        let share_stopped = self.media.stop_screen_share();
        let call_closed = self.transport.close();
        let chat_closed = self.chat.close();
        let was_in_call = self.state == CallState::InCall;

        if share_stopped {
            self.emit_source().await;
        }
        if chat_closed {
            self.emit(SessionEvent::ChatLinkChanged(self.chat.state())).await;
        }
        self.set_state(CallState::Ready).await;
        if call_closed || was_in_call || remote_closed {
            info!(call_closed, share_stopped, chat_closed, "call ended");
            self.inform("Call Ended", "").await;
        }
    }

    async fn connect_chat(&mut self, remote: &PeerId) {
        match self.transport.connect_data(remote).await {
            Ok(conn) => {
                self.chat.accept(conn);
                self.emit(SessionEvent::ChatLinkChanged(self.chat.state())).await;
            }
            Err(e) => self.report(e).await,
        }
    }

    async fn shutdown(&mut self) {
        self.end_call().await;
        self.media.release();
        self.transport.shutdown();
        self.audio_enabled = false;
        self.video_enabled = false;
        self.emit_source().await;
        self.emit(SessionEvent::Identity(None)).await;
        self.set_state(CallState::Idle).await;
        info!("session shut down");
    }

    fn outbound_stream(&self) -> CaptureStream {
        self.media
            .state()
            .live_stream()
            .cloned()
            .unwrap_or_else(CaptureStream::empty)
    }

    // -- Transport and chat events ------------------------------------------

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::IdentityReady(id) => {
                self.emit(SessionEvent::Identity(Some(id))).await;
            }
            TransportEvent::IdentityCollision {
                attempt,
                dropped_call,
            } => {
                if let Some(remote) = dropped_call {
                    warn!(%remote, "call lost with the old identity");
                    self.hang_up(false).await;
                }
                self.emit(SessionEvent::Identity(None)).await;
                let note = Notification::warning(
                    ErrorKind::IdentityCollision.label(),
                    format!("Requesting a new identity (attempt {attempt})."),
                );
                self.emit(SessionEvent::Notify(note)).await;
            }
            TransportEvent::IncomingCall(call) => {
                let caller = call.caller().clone();
                match self.answer(call) {
                    Ok(remote) => {
                        info!(%remote, "inbound call answered");
                        self.set_state(CallState::InCall).await;
                    }
                    Err(e) => info!(%caller, error = %e, "inbound call declined"),
                }
            }
            TransportEvent::InboundData(conn) => {
                self.chat.accept(conn);
                self.emit(SessionEvent::ChatLinkChanged(self.chat.state())).await;
            }
            TransportEvent::CallEstablished { remote } => {
                info!(%remote, "outbound call answered");
                self.set_state(CallState::InCall).await;
            }
            TransportEvent::CallEnded { remote } => {
                info!(%remote, "remote hung up");
                self.hang_up(true).await;
            }
            TransportEvent::CallFailed { remote, error } => {
                warn!(%remote, error = %error, "call failed");
                self.report(error).await;
                self.hang_up(false).await;
            }
            TransportEvent::PeerError(err) => {
                self.report(TransportError::Call(err)).await;
            }
            TransportEvent::Fatal(err) => {
                self.report(err).await;
                self.end_call().await;
                self.emit(SessionEvent::Identity(None)).await;
            }
        }
    }

    async fn on_chat_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::Connected { remote } => {
                self.emit(SessionEvent::ChatLinkChanged(self.chat.state())).await;
                self.inform("Chat Connected", format!("Chat established with {remote}"))
                    .await;
            }
            ChatEvent::Message(message) => {
                self.emit(SessionEvent::ChatMessage(message)).await;
            }
            ChatEvent::Disconnected { remote } => {
                self.emit(SessionEvent::ChatLinkChanged(self.chat.state())).await;
                self.inform("Chat Disconnected", format!("Chat with {remote} ended."))
                    .await;
            }
            ChatEvent::Failed { remote, error } => {
                warn!(%remote, error = %error, "chat link failed");
                self.emit(SessionEvent::ChatLinkChanged(self.chat.state())).await;
                self.report(error).await;
            }
        }
    }

    // -- Media --------------------------------------------------------------

    async fn toggle(&mut self, kind: MediaKind) {
        let current = match kind {
            MediaKind::Audio => self.audio_enabled,
            MediaKind::Video => self.video_enabled,
        };
        let enabled = match self.media.set_track_enabled(kind, !current) {
            Ok(()) => !current,
            Err(e) => {
                self.report(e).await;
                false
            }
        };
        match kind {
            MediaKind::Audio => self.audio_enabled = enabled,
            MediaKind::Video => self.video_enabled = enabled,
        }
        self.emit(SessionEvent::TrackToggled { kind, enabled }).await;
    }

    async fn start_share(&mut self) {
        match self.media.start_screen_share().await {
            Ok(_) => {
                self.emit_source().await;
                self.inform("Screen Sharing Started", "").await;
                self.sync_outgoing_video().await;
            }
            Err(e) => {
                self.report(e).await;
                self.fall_back().await;
            }
        }
    }

    async fn stop_share(&mut self) {
        if !self.media.stop_screen_share() {
            return;
        }
        self.emit_source().await;
        self.inform("Screen Sharing Ended", "").await;
        self.sync_outgoing_video().await;
    }

    async fn retry_camera(&mut self) {
        match self.media.acquire_camera().await {
            Ok(_) => {
                self.sync_track_flags();
                self.emit_source().await;
                self.sync_outgoing_video().await;
            }
            Err(e) => {
                self.report(e).await;
                self.emit_source().await;
            }
        }
    }

    /// Read the toggle flags back from the tracks. A reused camera stream
    /// keeps whatever enablement it had.
    fn sync_track_flags(&mut self) {
        let state = self.media.state();
        self.audio_enabled = state
            .live_stream()
            .is_some_and(|s| s.audio_tracks().any(MediaTrack::is_enabled));
        self.video_enabled = state
            .camera_video_track()
            .is_some_and(|t| t.is_enabled());
    }

    /// Return to the camera, or to no video, after a share failed to start
    /// or ended on its own.
    async fn fall_back(&mut self) {
        self.media.stop_screen_share();
        self.emit_source().await;
        self.sync_outgoing_video().await;
    }

    /// Make the active call transmit the live source's video.
    ///
    /// If the swap fails the share is stopped and the camera track is tried,
    /// then no video at all. If even that fails the call is ended, so a torn
    /// down track is never left transmitting.
    async fn sync_outgoing_video(&mut self) {
        if !self.transport.has_call() {
            return;
        }
        let wanted = self.media.state().live_video_track();
        if self.transport.outbound_video() == wanted {
            return;
        }
        let Err(e) = self.replace_video(wanted).await else {
            return;
        };
        self.report(e).await;

        if self.media.stop_screen_share() {
            self.emit_source().await;
            self.inform("Screen Sharing Ended", "").await;
        }
        if let Some(camera) = self.media.state().camera_video_track() {
            if self.replace_video(Some(camera)).await.is_ok() {
                return;
            }
        }
        if self.replace_video(None).await.is_ok() {
            return;
        }
        error!("could not restore outgoing video, ending call");
        self.end_call().await;
    }

    async fn replace_video(&self, track: Option<MediaTrack>) -> Result<(), TransportError> {
        self.transport.replace_outgoing_video_track(track).await
    }

    // -- Composer -----------------------------------------------------------

    async fn select_document(&mut self, path: &Path) {
        match self.chat.composer_mut().select_document(path).await {
            Ok(document) => {
                let name = document.name.clone();
                self.emit(SessionEvent::DocumentChanged(Some(name))).await;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "document rejected");
                self.emit(SessionEvent::Notify(e.to_notification())).await;
                self.emit(SessionEvent::DocumentChanged(None)).await;
            }
        }
    }

    async fn emit_draft(&self) {
        let draft = self.chat.composer().draft().to_string();
        self.emit(SessionEvent::DraftChanged(draft)).await;
    }

    // -- Summaries ----------------------------------------------------------

    /// Summarize the chat so far. An empty history short-circuits without
    /// contacting the summarizer.
    pub async fn summarize(&self) -> Result<String, SummaryError> {
        if self.chat.history().is_empty() {
            return Ok(NO_CHAT_TO_SUMMARIZE.to_string());
        }
        let summarizer = self.summarizer.as_ref().ok_or(SummaryError::Unavailable)?;
        let transcript = self.chat.history().transcript();
        Ok(summarizer.summarize(&transcript).await?)
    }

    // -- Events -------------------------------------------------------------

    async fn set_state(&mut self, next: CallState) {
        if self.state == next {
            return;
        }
        info!(from = ?self.state, to = ?next, "call state changed");
        self.state = next;
        self.emit(SessionEvent::StateChanged(next)).await;
    }

    async fn emit_source(&self) {
        self.emit(SessionEvent::SourceChanged {
            source: self.media.live_source(),
            preview: self.preview(),
        })
        .await;
    }

    async fn report(&self, err: impl Into<SessionError>) {
        let err = err.into();
        warn!(kind = ?err.kind(), error = %err, "reporting error");
        self.emit(SessionEvent::Notify(err.to_notification())).await;
    }

    async fn inform(&self, title: &str, body: impl Into<String>) {
        self.emit(SessionEvent::Notify(Notification::info(title, body)))
            .await;
    }

    async fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event).await;
    }
}
