//! Controller state, intents, events, and wiring.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chronoconnect_ai::Summarizer;
use chronoconnect_common::Notification;
use serde::Serialize;

use crate::chat::{ChatConfig, ChatLinkState, ChatMessage, ChatSignal};
use crate::identity::PeerId;
use crate::media::{CaptureDevices, MediaConfig, MediaEvent, MediaKind, MediaSource};
use crate::transport::{AudioOutput, Broker, TransportConfig, TransportSignal};

/// Returned by a summary request when there is nothing to summarize.
pub const NO_CHAT_TO_SUMMARIZE: &str = "No chat messages to summarize.";

const INITIALIZING_CAMERA: &str = "Initializing camera...";
const CAMERA_DENIED: &str =
    "Camera permission denied. You can use audio, chat, and share your screen.";
const VIDEO_OFF: &str = "Video is off or unavailable. Turn on video or check permissions.";

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Call state. Screen sharing is tracked separately and can be on in
/// `Ready` or `InCall`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum CallState {
    #[default]
    Idle,
    AcquiringMedia,
    Ready,
    InCall,
}

/// What the local preview shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Preview {
    Camera,
    ScreenShare,
    Placeholder(String),
}

impl Preview {
    pub fn for_source(source: MediaSource, camera_permission: Option<bool>) -> Self {
        match source {
            MediaSource::Camera => Self::Camera,
            MediaSource::ScreenShare => Self::ScreenShare,
            MediaSource::None => {
                let text = match camera_permission {
                    None => INITIALIZING_CAMERA,
                    Some(false) => CAMERA_DENIED,
                    Some(true) => VIDEO_OFF,
                };
                Self::Placeholder(text.to_string())
            }
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }
}

/// Everything a presentation surface renders.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub identity: Option<PeerId>,
    pub call_state: CallState,
    pub chat_messages: Vec<ChatMessage>,
    pub chat_link_state: ChatLinkState,
    pub live_source: MediaSource,
    pub preview: Preview,
    pub camera_permission: Option<bool>,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub sharing: bool,
    pub draft: String,
    /// Name of the document waiting to be inserted into the draft.
    pub document: Option<String>,
}

// ---------------------------------------------------------------------------
// Intents and events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    ToggleAudio,
    ToggleVideo,
    StartShare,
    StopShare,
    Call(PeerId),
    ConnectChat(PeerId),
    Hangup,
    SendChat(String),
    /// Replace the composer draft.
    EditDraft(String),
    /// Send the composer draft and clear it.
    SendDraft,
    SelectDocument(PathBuf),
    InsertDocument,
    ClearDocument,
    Summarize,
    RetryCamera,
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(CallState),
    Identity(Option<PeerId>),
    SourceChanged { source: MediaSource, preview: Preview },
    TrackToggled { kind: MediaKind, enabled: bool },
    ChatMessage(ChatMessage),
    ChatLinkChanged(ChatLinkState),
    DraftChanged(String),
    DocumentChanged(Option<String>),
    Summary(String),
    Notify(Notification),
}

/// A background input for the controller.
#[derive(Debug)]
pub enum Signal {
    Media(MediaEvent),
    Transport(TransportSignal),
    Chat(ChatSignal),
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub media: MediaConfig,
    pub transport: TransportConfig,
    pub chat: ChatConfig,
}

/// External parts the controller drives.
pub struct Collaborators {
    pub devices: Arc<dyn CaptureDevices>,
    pub broker: Arc<dyn Broker>,
    pub audio: Arc<dyn AudioOutput>,
    /// Without one, summary requests fail with `SummaryError::Unavailable`.
    pub summarizer: Option<Arc<dyn Summarizer>>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("summarizer", &self.summarizer.is_some())
            .finish_non_exhaustive()
    }
}
