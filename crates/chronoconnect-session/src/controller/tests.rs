use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chronoconnect_ai::{AiError, Summarizer};
use chronoconnect_common::Notification;
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::*;
use crate::chat::ChatLinkState;
use crate::identity::PeerId;
use crate::media::{DeviceOutcome, MediaKind, MediaSource, VirtualDevices};
use crate::protocol::{BrokerError, BrokerErrorKind};
use crate::transport::{LoopbackBroker, NullAudioOutput, TransportConfig};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingSummarizer {
    transcripts: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl Summarizer for RecordingSummarizer {
    async fn summarize(&self, transcript: &str) -> Result<String, AiError> {
        self.transcripts.lock().unwrap().push(transcript.to_string());
        if self.fail {
            Err(AiError::ApiError("quota exceeded".into()))
        } else {
            Ok("They said hello.".into())
        }
    }
}

struct Side {
    ctl: SessionController,
    events: mpsc::Receiver<SessionEvent>,
    seen: Vec<SessionEvent>,
    devices: Arc<VirtualDevices>,
}

fn config() -> SessionConfig {
    SessionConfig {
        transport: TransportConfig {
            collision_backoff: Duration::from_millis(20),
            ..TransportConfig::default()
        },
        ..SessionConfig::default()
    }
}

fn side_with(broker: &LoopbackBroker, summarizer: Option<Arc<dyn Summarizer>>) -> Side {
    let devices = Arc::new(VirtualDevices::new());
    let (ctl, events) = SessionController::new(
        config(),
        Collaborators {
            devices: devices.clone(),
            broker: Arc::new(broker.clone()),
            audio: Arc::new(NullAudioOutput::new()),
            summarizer,
        },
    );
    Side {
        ctl,
        events,
        seen: Vec::new(),
        devices,
    }
}

fn side(broker: &LoopbackBroker) -> Side {
    side_with(broker, None)
}

impl Side {
    fn drain(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.seen.push(event);
        }
    }

    /// Apply signals until an emitted event satisfies `pred`.
    async fn pump_until(&mut self, pred: impl Fn(&SessionEvent) -> bool) -> SessionEvent {
        loop {
            while let Ok(event) = self.events.try_recv() {
                self.seen.push(event.clone());
                if pred(&event) {
                    return event;
                }
            }
            let signal = timeout(Duration::from_secs(2), self.ctl.next_signal())
                .await
                .expect("timed out waiting for a session event")
                .expect("signal sources closed");
            self.ctl.handle_signal(signal).await;
        }
    }

    /// Apply whatever signals arrive within a short window.
    async fn settle(&mut self) {
        while let Ok(Some(signal)) =
            timeout(Duration::from_millis(50), self.ctl.next_signal()).await
        {
            self.ctl.handle_signal(signal).await;
        }
        self.drain();
    }

    async fn start(&mut self) -> PeerId {
        self.ctl.startup().await.unwrap();
        match self
            .pump_until(|e| matches!(e, SessionEvent::Identity(Some(_))))
            .await
        {
            SessionEvent::Identity(Some(id)) => id,
            _ => unreachable!(),
        }
    }

    async fn intent(&mut self, intent: Intent) {
        assert!(self.ctl.handle_intent(intent).await);
        self.drain();
    }

    fn notifications(&mut self) -> Vec<Notification> {
        self.drain();
        self.seen
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Notify(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    fn has_notification(&mut self, title: &str) -> bool {
        self.notifications().iter().any(|n| n.title == title)
    }

    /// The transmitted track matches the live source's video.
    fn transmits_live_source(&self) -> bool {
        self.ctl.transport().outbound_video() == self.ctl.media().state().live_video_track()
    }
}

/// `a` dials `b` and both end up `InCall` with chat open.
async fn in_call(a: &mut Side, b: &mut Side, b_id: &PeerId) {
    a.intent(Intent::Call(b_id.clone())).await;
    b.pump_until(|e| matches!(e, SessionEvent::StateChanged(CallState::InCall)))
        .await;
    a.pump_until(|e| matches!(e, SessionEvent::StateChanged(CallState::InCall)))
        .await;
    b.settle().await;
    a.settle().await;
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn startup_with_camera_reaches_ready() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);

    let id = a.start().await;
    let snap = a.ctl.snapshot();
    assert_eq!(snap.call_state, CallState::Ready);
    assert_eq!(snap.identity, Some(id));
    assert_eq!(snap.live_source, MediaSource::Camera);
    assert_eq!(snap.preview, Preview::Camera);
    assert_eq!(snap.camera_permission, Some(true));
    assert!(snap.audio_enabled && snap.video_enabled);

    let states: Vec<_> = a
        .seen
        .iter()
        .filter_map(|e| match e {
            SessionEvent::StateChanged(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![CallState::AcquiringMedia, CallState::Ready]);
}

#[tokio::test]
async fn denied_camera_still_allows_screen_share() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    a.devices.set_camera(DeviceOutcome::Deny);
    a.start().await;

    let snap = a.ctl.snapshot();
    assert_eq!(snap.call_state, CallState::Ready);
    assert_eq!(snap.camera_permission, Some(false));
    assert_eq!(snap.live_source, MediaSource::None);
    assert_eq!(
        snap.preview,
        Preview::Placeholder(
            "Camera permission denied. You can use audio, chat, and share your screen.".into()
        )
    );
    assert!(a.has_notification("Permission Denied"));

    a.intent(Intent::StartShare).await;
    assert_eq!(a.ctl.snapshot().live_source, MediaSource::ScreenShare);
    assert_eq!(a.ctl.preview(), Preview::ScreenShare);

    a.intent(Intent::StopShare).await;
    let snap = a.ctl.snapshot();
    assert_eq!(snap.live_source, MediaSource::None);
    assert!(snap.preview.is_placeholder());
    assert!(!snap.sharing);
}

#[tokio::test]
async fn camera_is_requested_once_until_retried() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    a.devices.set_camera(DeviceOutcome::Unavailable);
    a.start().await;
    assert_eq!(a.devices.camera_requests(), 1);
    assert!(a.has_notification("Device Unavailable"));

    a.intent(Intent::StartShare).await;
    a.intent(Intent::StopShare).await;
    assert_eq!(a.devices.camera_requests(), 1);

    a.devices.set_camera(DeviceOutcome::Grant);
    a.intent(Intent::RetryCamera).await;
    assert_eq!(a.devices.camera_requests(), 2);
    assert_eq!(a.ctl.snapshot().live_source, MediaSource::Camera);
}

#[tokio::test]
async fn unusable_rendezvous_service_is_reported() {
    let broker = LoopbackBroker::new();
    broker.fail_open("script failed to load");
    let mut a = side(&broker);

    assert!(a.ctl.startup().await.is_err());
    assert_eq!(a.ctl.state(), CallState::Ready);
    assert!(a.has_notification("Service Unavailable"));
}

#[tokio::test]
async fn identity_collision_recovers_with_a_fresh_identity() {
    let broker = LoopbackBroker::new();
    broker.inject_collisions(1);
    let mut a = side(&broker);
    a.ctl.startup().await.unwrap();

    a.pump_until(|e| matches!(e, SessionEvent::Identity(None)))
        .await;
    let id = match a
        .pump_until(|e| matches!(e, SessionEvent::Identity(Some(_))))
        .await
    {
        SessionEvent::Identity(Some(id)) => id,
        _ => unreachable!(),
    };
    assert!(broker.is_registered(&id));
    assert_eq!(broker.stats().opened, 2);
    assert!(a.has_notification("Identity Collision"));
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

#[tokio::test]
async fn call_is_auto_answered_and_chat_connects() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    let mut b = side(&broker);
    a.start().await;
    let b_id = b.start().await;

    in_call(&mut a, &mut b, &b_id).await;

    assert_eq!(a.ctl.state(), CallState::InCall);
    assert_eq!(b.ctl.state(), CallState::InCall);
    assert_eq!(a.ctl.snapshot().chat_link_state, ChatLinkState::Open);
    assert_eq!(b.ctl.snapshot().chat_link_state, ChatLinkState::Open);
    assert!(a.has_notification("Chat Connected"));
    assert!(a.transmits_live_source());
    assert!(b.transmits_live_source());

    a.intent(Intent::SendChat("hello".into())).await;
    let event = b
        .pump_until(|e| matches!(e, SessionEvent::ChatMessage(_)))
        .await;
    match event {
        SessionEvent::ChatMessage(m) => assert_eq!(m.text, "hello"),
        _ => unreachable!(),
    }
    assert_eq!(b.ctl.chat_history().len(), 1);
}

#[tokio::test]
async fn dialing_while_in_a_call_is_refused() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    let mut b = side(&broker);
    a.start().await;
    let b_id = b.start().await;
    in_call(&mut a, &mut b, &b_id).await;

    let calls = broker.stats().calls;
    a.intent(Intent::Call(b_id)).await;
    assert_eq!(broker.stats().calls, calls);
    assert!(a.has_notification("Connection Error"));
}

#[tokio::test]
async fn inbound_call_while_in_a_call_is_declined() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    let mut b = side(&broker);
    let mut c = side(&broker);
    let a_id = a.start().await;
    let b_id = b.start().await;
    c.start().await;
    in_call(&mut a, &mut b, &b_id).await;

    c.intent(Intent::Call(b_id)).await;
    b.settle().await;
    c.pump_until(|e| matches!(e, SessionEvent::Notify(n) if n.title == "Call Ended"))
        .await;

    assert_eq!(c.ctl.state(), CallState::Ready);
    assert_eq!(b.ctl.state(), CallState::InCall);
    assert_eq!(b.ctl.transport().call_remote(), Some(&a_id));
}

#[tokio::test]
async fn remote_hangup_returns_to_ready() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    let mut b = side(&broker);
    a.start().await;
    let b_id = b.start().await;
    in_call(&mut a, &mut b, &b_id).await;

    b.intent(Intent::Hangup).await;
    assert_eq!(b.ctl.state(), CallState::Ready);

    a.pump_until(|e| matches!(e, SessionEvent::StateChanged(CallState::Ready)))
        .await;
    a.settle().await;
    assert!(a.has_notification("Call Ended"));
    assert!(!a.ctl.transport().has_call());
    assert_ne!(a.ctl.snapshot().chat_link_state, ChatLinkState::Open);
}

#[tokio::test]
async fn end_call_is_idempotent() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    let mut b = side(&broker);
    a.start().await;
    let b_id = b.start().await;
    in_call(&mut a, &mut b, &b_id).await;
    a.intent(Intent::StartShare).await;

    a.intent(Intent::Hangup).await;
    let snap = a.ctl.snapshot();
    assert_eq!(snap.call_state, CallState::Ready);
    assert!(!snap.sharing);
    assert_eq!(snap.live_source, MediaSource::Camera);
    assert_eq!(snap.chat_link_state, ChatLinkState::Closed);

    let stats = broker.stats();
    let seen = a.seen.len();
    a.intent(Intent::Hangup).await;
    assert_eq!(broker.stats(), stats);
    assert_eq!(a.seen.len(), seen);
    assert_eq!(a.ctl.state(), CallState::Ready);
}

#[tokio::test]
async fn collision_mid_call_hangs_up_and_allows_a_new_call() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    let mut b = side(&broker);
    let a_id = a.start().await;
    let b_id = b.start().await;
    in_call(&mut a, &mut b, &b_id).await;
    a.intent(Intent::StartShare).await;

    broker
        .inject_error(&a_id, BrokerError::new(BrokerErrorKind::UnavailableId, "taken"))
        .await;
    a.pump_until(|e| matches!(e, SessionEvent::Identity(None)))
        .await;
    let snap = a.ctl.snapshot();
    assert_eq!(snap.call_state, CallState::Ready);
    assert!(!a.ctl.transport().has_call());
    assert!(!snap.sharing);
    assert_eq!(snap.live_source, MediaSource::Camera);
    assert_eq!(snap.chat_link_state, ChatLinkState::Closed);
    assert!(a.has_notification("Call Ended"));

    a.pump_until(|e| matches!(e, SessionEvent::Identity(Some(_))))
        .await;
    b.pump_until(|e| matches!(e, SessionEvent::StateChanged(CallState::Ready)))
        .await;
    b.settle().await;

    in_call(&mut a, &mut b, &b_id).await;
    assert_eq!(a.ctl.state(), CallState::InCall);
    assert!(a.ctl.transport().has_call());
    assert!(!a.has_notification("Connection Error"));
}

#[tokio::test]
async fn fatal_error_mid_call_returns_to_ready() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    let mut b = side(&broker);
    let a_id = a.start().await;
    let b_id = b.start().await;
    in_call(&mut a, &mut b, &b_id).await;
    a.intent(Intent::StartShare).await;

    broker
        .inject_error(&a_id, BrokerError::new(BrokerErrorKind::Network, "lost"))
        .await;
    a.pump_until(|e| matches!(e, SessionEvent::Identity(None)))
        .await;
    let snap = a.ctl.snapshot();
    assert_eq!(snap.call_state, CallState::Ready);
    assert!(!a.ctl.transport().has_call());
    assert!(!snap.sharing);
    assert_eq!(snap.chat_link_state, ChatLinkState::Closed);
    assert!(a.has_notification("Connection Error"));
    assert!(a.has_notification("Call Ended"));
}

#[tokio::test]
async fn failed_dial_is_not_announced_as_ended() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    let mut b = side(&broker);
    let a_id = a.start().await;
    let b_id = b.start().await;

    // `b` never pumps, so the call is still unanswered.
    a.intent(Intent::Call(b_id)).await;
    assert!(a.ctl.transport().has_call());
    broker
        .inject_error(
            &a_id,
            BrokerError::new(BrokerErrorKind::PeerUnavailable, "no answer"),
        )
        .await;
    a.pump_until(|e| matches!(e, SessionEvent::Notify(n) if n.title == "Connection Error"))
        .await;
    a.settle().await;

    assert!(!a.ctl.transport().has_call());
    assert_eq!(a.ctl.state(), CallState::Ready);
    assert!(!a.has_notification("Call Ended"));
}

#[tokio::test]
async fn end_call_before_startup_is_safe() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    a.ctl.end_call().await;
    assert_eq!(a.ctl.state(), CallState::Ready);
    assert!(!a.has_notification("Call Ended"));
}

// ---------------------------------------------------------------------------
// Source switching
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sharing_mid_call_swaps_the_transmitted_track() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    let mut b = side(&broker);
    a.start().await;
    let b_id = b.start().await;
    in_call(&mut a, &mut b, &b_id).await;

    let camera = a.ctl.media().state().camera_video_track();
    a.intent(Intent::StartShare).await;
    assert_eq!(a.ctl.media().live_source(), MediaSource::ScreenShare);
    assert!(a.transmits_live_source());
    assert_ne!(a.ctl.transport().outbound_video(), camera);
    assert!(a.has_notification("Screen Sharing Started"));

    a.intent(Intent::StopShare).await;
    assert_eq!(a.ctl.transport().outbound_video(), camera);
    assert_eq!(a.ctl.state(), CallState::InCall);
}

#[tokio::test]
async fn any_share_sequence_settles_on_the_live_source() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    let mut b = side(&broker);
    a.start().await;
    let b_id = b.start().await;
    in_call(&mut a, &mut b, &b_id).await;

    let steps = [
        Intent::StartShare,
        Intent::StartShare,
        Intent::StopShare,
        Intent::StopShare,
        Intent::StartShare,
        Intent::StopShare,
        Intent::StartShare,
    ];
    for step in steps {
        a.intent(step).await;
        assert!(a.transmits_live_source());
    }
    assert_eq!(a.ctl.media().live_source(), MediaSource::ScreenShare);
}

#[tokio::test]
async fn external_share_end_reverts_to_camera() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    let mut b = side(&broker);
    a.start().await;
    let b_id = b.start().await;
    in_call(&mut a, &mut b, &b_id).await;
    a.intent(Intent::StartShare).await;

    assert!(a.devices.end_display_capture());
    a.pump_until(|e| {
        matches!(
            e,
            SessionEvent::SourceChanged {
                source: MediaSource::Camera,
                ..
            }
        )
    })
    .await;

    assert!(!a.ctl.media().is_sharing());
    assert!(a.transmits_live_source());
    assert!(a.has_notification("Screen Sharing Ended"));
    assert_eq!(a.ctl.state(), CallState::InCall);
}

#[tokio::test]
async fn failed_track_swap_falls_back_to_camera() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    let mut b = side(&broker);
    a.start().await;
    let b_id = b.start().await;
    in_call(&mut a, &mut b, &b_id).await;

    let camera = a.ctl.media().state().camera_video_track();
    broker.fail_replacements(1);
    a.intent(Intent::StartShare).await;

    assert!(!a.ctl.media().is_sharing());
    assert_eq!(a.ctl.media().live_source(), MediaSource::Camera);
    assert_eq!(a.ctl.transport().outbound_video(), camera);
    assert!(a.has_notification("Connection Error"));
    assert_eq!(a.ctl.state(), CallState::InCall);
}

#[tokio::test]
async fn unrecoverable_track_swap_ends_the_call() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    let mut b = side(&broker);
    a.start().await;
    let b_id = b.start().await;
    in_call(&mut a, &mut b, &b_id).await;

    broker.fail_replacements(3);
    a.intent(Intent::StartShare).await;

    assert_eq!(a.ctl.state(), CallState::Ready);
    assert!(!a.ctl.transport().has_call());
    assert!(a.has_notification("Call Ended"));
}

#[tokio::test]
async fn denied_or_disallowed_share_keeps_the_camera() {
    for (outcome, title) in [
        (DeviceOutcome::Deny, "Permission Denied"),
        (DeviceOutcome::Disallow, "Disallowed by Policy"),
    ] {
        let broker = LoopbackBroker::new();
        let mut a = side(&broker);
        let mut b = side(&broker);
        a.start().await;
        let b_id = b.start().await;
        in_call(&mut a, &mut b, &b_id).await;

        a.devices.set_display(outcome);
        a.intent(Intent::StartShare).await;

        assert!(a.has_notification(title));
        assert_eq!(a.ctl.media().live_source(), MediaSource::Camera);
        assert!(a.transmits_live_source());
        assert_eq!(a.ctl.state(), CallState::InCall);
    }
}

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn toggling_audio_mutes_the_live_stream() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    a.start().await;

    a.intent(Intent::ToggleAudio).await;
    let stream = a.ctl.media().state().live_stream().cloned().unwrap();
    assert!(stream.audio_tracks().all(|t| !t.is_enabled()));
    assert!(!a.ctl.snapshot().audio_enabled);

    a.intent(Intent::ToggleAudio).await;
    assert!(stream.audio_tracks().all(|t| t.is_enabled()));
}

#[tokio::test]
async fn toggling_video_without_a_camera_reports_and_disables() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    a.devices.set_camera(DeviceOutcome::Deny);
    a.start().await;

    a.intent(Intent::ToggleVideo).await;
    assert!(a.has_notification("Device Unavailable"));
    assert!(a.seen.iter().any(|e| matches!(
        e,
        SessionEvent::TrackToggled {
            kind: MediaKind::Video,
            enabled: false
        }
    )));
    assert!(!a.ctl.snapshot().video_enabled);
}

#[tokio::test]
async fn camera_retry_keeps_toggle_flags_in_step_with_tracks() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    a.start().await;

    a.intent(Intent::ToggleVideo).await;
    a.intent(Intent::RetryCamera).await;
    let track = a.ctl.media().state().camera_video_track().unwrap();
    let snap = a.ctl.snapshot();
    assert!(!track.is_enabled());
    assert_eq!(snap.video_enabled, track.is_enabled());
    assert!(snap.audio_enabled);

    a.intent(Intent::ToggleVideo).await;
    assert!(track.is_enabled());
    assert!(a.ctl.snapshot().video_enabled);
}

// ---------------------------------------------------------------------------
// Chat and summaries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chat_without_a_link_stays_local() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    a.start().await;

    a.intent(Intent::SendChat("note to self".into())).await;
    let messages = a.ctl.snapshot().chat_messages;
    assert_eq!(messages.len(), 1);
    assert!(!messages[0].delivered);

    a.intent(Intent::SendChat("   ".into())).await;
    assert_eq!(a.ctl.chat_history().len(), 1);
}

#[tokio::test]
async fn document_is_inserted_into_the_draft_before_sending() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.md");
    std::fs::write(&path, "ship on friday").unwrap();

    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    let mut b = side(&broker);
    a.start().await;
    let b_id = b.start().await;
    in_call(&mut a, &mut b, &b_id).await;

    a.intent(Intent::EditDraft("Notes: ".into())).await;
    a.intent(Intent::SelectDocument(path)).await;
    assert_eq!(a.ctl.snapshot().document.as_deref(), Some("notes.md"));

    a.intent(Intent::InsertDocument).await;
    let snap = a.ctl.snapshot();
    assert_eq!(snap.draft, "Notes: ship on friday");
    assert_eq!(snap.document, None);

    a.intent(Intent::SendDraft).await;
    assert_eq!(a.ctl.snapshot().draft, "");
    let event = b
        .pump_until(|e| matches!(e, SessionEvent::ChatMessage(_)))
        .await;
    match event {
        SessionEvent::ChatMessage(m) => assert_eq!(m.text, "Notes: ship on friday"),
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn rejected_documents_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let slides = dir.path().join("slides.pdf");
    std::fs::write(&slides, "%PDF-1.7").unwrap();

    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    a.start().await;

    a.intent(Intent::SelectDocument(slides)).await;
    let note = a
        .notifications()
        .into_iter()
        .find(|n| n.title == "Invalid File Type")
        .unwrap();
    assert_eq!(note.body, "Please select a .txt or .md file.");

    a.intent(Intent::SelectDocument(dir.path().join("missing.txt")))
        .await;
    assert!(a.has_notification("File Read Error"));
    assert_eq!(a.ctl.snapshot().document, None);

    a.intent(Intent::InsertDocument).await;
    assert_eq!(a.ctl.snapshot().draft, "");
}

#[tokio::test]
async fn empty_history_summary_skips_the_summarizer() {
    let broker = LoopbackBroker::new();
    let summarizer = Arc::new(RecordingSummarizer::default());
    let mut a = side_with(&broker, Some(summarizer.clone()));
    a.start().await;

    a.intent(Intent::Summarize).await;
    assert!(a
        .seen
        .iter()
        .any(|e| matches!(e, SessionEvent::Summary(s) if s == NO_CHAT_TO_SUMMARIZE)));
    assert!(summarizer.transcripts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn summary_receives_the_labelled_transcript() {
    let broker = LoopbackBroker::new();
    let summarizer = Arc::new(RecordingSummarizer::default());
    let mut a = side_with(&broker, Some(summarizer.clone()));
    a.start().await;
    a.intent(Intent::SendChat("hello".into())).await;

    a.intent(Intent::Summarize).await;
    let transcripts = summarizer.transcripts.lock().unwrap().clone();
    assert_eq!(transcripts.len(), 1);
    assert!(transcripts[0].starts_with("You ("));
    assert!(transcripts[0].ends_with("): hello"));
    assert!(a
        .seen
        .iter()
        .any(|e| matches!(e, SessionEvent::Summary(s) if s == "They said hello.")));
}

#[tokio::test]
async fn summary_failure_is_surfaced() {
    let broker = LoopbackBroker::new();
    let summarizer = Arc::new(RecordingSummarizer {
        fail: true,
        ..RecordingSummarizer::default()
    });
    let mut a = side_with(&broker, Some(summarizer));
    a.start().await;
    a.intent(Intent::SendChat("hello".into())).await;

    a.intent(Intent::Summarize).await;
    let note = a
        .notifications()
        .into_iter()
        .find(|n| n.title == "Summarization Error")
        .unwrap();
    assert_eq!(note.body, "Error: API error: quota exceeded");
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_releases_everything() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    let mut b = side(&broker);
    let a_id = a.start().await;
    let b_id = b.start().await;
    in_call(&mut a, &mut b, &b_id).await;
    let camera = a.ctl.media().state().camera.clone().unwrap();

    assert!(!a.ctl.handle_intent(Intent::Shutdown).await);
    assert_eq!(a.ctl.state(), CallState::Idle);
    assert!(!camera.is_active());
    assert!(!broker.is_registered(&a_id));
    assert!(a.ctl.identity().is_none());
    assert_eq!(a.ctl.media().live_source(), MediaSource::None);
}

#[tokio::test]
async fn run_loop_stops_when_intents_close() {
    let broker = LoopbackBroker::new();
    let mut a = side(&broker);
    let a_id = a.start().await;

    let (tx, rx) = mpsc::channel(4);
    tx.send(Intent::SendChat("bye".into())).await.unwrap();
    drop(tx);
    timeout(Duration::from_secs(2), a.ctl.run(rx))
        .await
        .expect("run loop did not stop");
    assert!(!broker.is_registered(&a_id));
}
