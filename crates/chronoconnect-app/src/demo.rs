//! Headless demo: two endpoints on a loopback rendezvous walk through a
//! call with chat and a screen share.

use std::sync::Arc;
use std::time::Duration;

use chronoconnect_ai::Summarizer;
use chronoconnect_common::NotificationQueue;
use chronoconnect_session::error::TransportError;
use chronoconnect_session::{
    Collaborators, DeviceOutcome, Intent, LoopbackBroker, NullAudioOutput, PeerId,
    SessionConfig, SessionController, SessionError, SessionEvent, VirtualDevices,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// How long an endpoint must stay quiet to count as settled.
const QUIET: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, Default)]
pub struct DemoOptions {
    pub summarize: bool,
    pub deny_camera: bool,
}

struct Endpoint {
    name: &'static str,
    ctl: SessionController,
    events: mpsc::Receiver<SessionEvent>,
    devices: Arc<VirtualDevices>,
    notes: NotificationQueue,
}

impl Endpoint {
    fn new(
        name: &'static str,
        config: SessionConfig,
        broker: &LoopbackBroker,
        summarizer: Option<Arc<dyn Summarizer>>,
    ) -> Self {
        let devices = Arc::new(VirtualDevices::new());
        let (ctl, events) = SessionController::new(
            config,
            Collaborators {
                devices: devices.clone(),
                broker: Arc::new(broker.clone()),
                audio: Arc::new(NullAudioOutput::new()),
                summarizer,
            },
        );
        Self {
            name,
            ctl,
            events,
            devices,
            notes: NotificationQueue::default(),
        }
    }

    async fn intent(&mut self, intent: Intent) {
        self.ctl.handle_intent(intent).await;
        self.drain();
    }

    /// Apply background signals until none arrive for a while.
    async fn settle(&mut self) {
        while let Ok(Some(signal)) = timeout(QUIET, self.ctl.next_signal()).await {
            self.ctl.handle_signal(signal).await;
            self.drain();
        }
        self.drain();
    }

    fn drain(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.record(event);
        }
    }

    fn record(&mut self, event: SessionEvent) {
        let name = self.name;
        match event {
            SessionEvent::Notify(note) => {
                println!("[{name}] {note}");
                self.notes.push(note);
            }
            SessionEvent::ChatMessage(message) => {
                println!("[{name}] {}", message.transcript_line());
            }
            SessionEvent::Summary(summary) => println!("[{name}] summary: {summary}"),
            SessionEvent::StateChanged(state) => info!(endpoint = name, ?state, "state"),
            SessionEvent::Identity(Some(id)) => info!(endpoint = name, %id, "identity"),
            other => debug!(endpoint = name, event = ?other, "event"),
        }
    }

    fn print_snapshot(&self) {
        match serde_json::to_string_pretty(&self.ctl.snapshot()) {
            Ok(json) => println!("[{}] final state:\n{json}", self.name),
            Err(e) => warn!(endpoint = self.name, error = %e, "could not render snapshot"),
        }
    }
}

fn identity_of(endpoint: &Endpoint) -> Result<PeerId, SessionError> {
    endpoint
        .ctl
        .identity()
        .cloned()
        .ok_or(SessionError::Transport(TransportError::NotReady))
}

pub async fn run(
    config: SessionConfig,
    summarizer: Option<Arc<dyn Summarizer>>,
    options: DemoOptions,
) -> Result<(), SessionError> {
    let broker = LoopbackBroker::new();
    let mut alice = Endpoint::new("alice", config.clone(), &broker, summarizer);
    let mut bob = Endpoint::new("bob", config, &broker, None);
    if options.deny_camera {
        alice.devices.set_camera(DeviceOutcome::Deny);
    }

    alice.ctl.startup().await?;
    bob.ctl.startup().await?;
    alice.settle().await;
    bob.settle().await;
    let bob_id = identity_of(&bob)?;
    info!(alice = %identity_of(&alice)?, bob = %bob_id, "both endpoints registered");

    alice.intent(Intent::Call(bob_id)).await;
    bob.settle().await;
    alice.settle().await;
    bob.settle().await;

    alice.intent(Intent::SendChat("Can you see my screen?".into())).await;
    alice.intent(Intent::StartShare).await;
    bob.settle().await;
    bob.intent(Intent::EditDraft("Yes, the slides look good.".into())).await;
    bob.intent(Intent::SendDraft).await;
    alice.settle().await;

    // The platform's own "stop sharing" control.
    alice.devices.end_display_capture();
    alice.settle().await;

    if options.summarize {
        alice.intent(Intent::Summarize).await;
    }

    bob.intent(Intent::Hangup).await;
    alice.settle().await;

    alice.print_snapshot();
    bob.print_snapshot();

    alice.intent(Intent::Shutdown).await;
    bob.intent(Intent::Shutdown).await;
    info!(
        alice_notifications = alice.notes.len(),
        bob_notifications = bob.notes.len(),
        "demo finished"
    );
    Ok(())
}
