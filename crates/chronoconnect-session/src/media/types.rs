//! Types, configuration, and events for local media.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

/// Track lifecycle. `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Active,
    Ended,
}

struct TrackInner {
    id: String,
    kind: MediaKind,
    label: String,
    enabled: AtomicBool,
    state: watch::Sender<TrackState>,
}

/// A single audio or video elementary stream.
///
/// Cheap to clone; clones share the same enabled flag and lifecycle, so a
/// track handed to the transport is the same track the capture owns.
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    pub fn new(kind: MediaKind, label: impl Into<String>) -> Self {
        let (state, _) = watch::channel(TrackState::Active);
        Self {
            inner: Arc::new(TrackInner {
                id: chronoconnect_common::new_id(),
                kind,
                label: label.into(),
                enabled: AtomicBool::new(true),
                state,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> MediaKind {
        self.inner.kind
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Relaxed)
    }

    /// Mute or hide the track without touching the connection.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn state(&self) -> TrackState {
        *self.inner.state.borrow()
    }

    pub fn is_live(&self) -> bool {
        self.state() == TrackState::Active
    }

    /// End the track. Returns `false` if it had already ended.
    pub fn stop(&self) -> bool {
        self.inner.state.send_if_modified(|state| {
            if *state == TrackState::Ended {
                false
            } else {
                *state = TrackState::Ended;
                true
            }
        })
    }

    /// Resolves once the track has ended, whoever stopped it.
    pub async fn ended(&self) {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|state| *state == TrackState::Ended).await;
    }
}

impl PartialEq for MediaTrack {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for MediaTrack {}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("label", &self.inner.label)
            .field("enabled", &self.is_enabled())
            .field("state", &self.state())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// A group of tracks captured together.
#[derive(Debug, Clone)]
pub struct CaptureStream {
    id: String,
    tracks: Vec<MediaTrack>,
}

impl CaptureStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: chronoconnect_common::new_id(),
            tracks,
        }
    }

    /// A stream with no tracks, used to answer or dial without local media.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn video_track(&self) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.kind() == MediaKind::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == MediaKind::Audio)
    }

    /// A stream is active while any of its tracks is live.
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    /// Set the enabled flag on every track of `kind`. Returns how many
    /// tracks were touched.
    pub fn set_enabled(&self, kind: MediaKind, enabled: bool) -> usize {
        let mut touched = 0;
        for track in self.tracks.iter().filter(|t| t.kind() == kind) {
            track.set_enabled(enabled);
            touched += 1;
        }
        touched
    }
}

// ---------------------------------------------------------------------------
// Sources and state
// ---------------------------------------------------------------------------

/// Which capture feeds the preview and the outgoing video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaSource {
    Camera,
    ScreenShare,
    #[default]
    None,
}

/// Everything the manager knows about local capture, in one place.
///
/// The camera stream survives a screen share so that stopping the share
/// can restore it without prompting again.
#[derive(Debug, Clone, Default)]
pub struct MediaState {
    pub live_source: MediaSource,
    pub camera: Option<CaptureStream>,
    pub screen: Option<CaptureStream>,
}

impl MediaState {
    pub fn is_sharing(&self) -> bool {
        self.screen.is_some()
    }

    pub fn camera_active(&self) -> bool {
        self.camera.as_ref().is_some_and(CaptureStream::is_active)
    }

    pub fn live_stream(&self) -> Option<&CaptureStream> {
        match self.live_source {
            MediaSource::Camera => self.camera.as_ref(),
            MediaSource::ScreenShare => self.screen.as_ref(),
            MediaSource::None => None,
        }
    }

    /// The video track that should be transmitted right now.
    pub fn live_video_track(&self) -> Option<MediaTrack> {
        self.live_stream().and_then(CaptureStream::video_track).cloned()
    }

    /// The camera's video track, if the camera is still capturing.
    pub fn camera_video_track(&self) -> Option<MediaTrack> {
        self.camera
            .as_ref()
            .filter(|c| c.is_active())
            .and_then(CaptureStream::video_track)
            .cloned()
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Options passed to the display-capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenShareOptions {
    pub capture_audio: bool,
    pub suppress_local_audio_playback: bool,
    pub show_cursor: bool,
}

impl Default for ScreenShareOptions {
    fn default() -> Self {
        Self {
            capture_audio: true,
            suppress_local_audio_playback: true,
            show_cursor: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Request the camera once when the session starts.
    pub auto_acquire_camera: bool,
    pub share: ScreenShareOptions,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            auto_acquire_camera: true,
            share: ScreenShareOptions::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// The screen capture ended without being asked to (for example the
    /// user pressed the platform's "stop sharing" control).
    ScreenShareEnded { share_id: u64 },
}
