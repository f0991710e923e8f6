//! Media manager: camera acquisition, screen share start/stop, and track
//! enablement.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::MediaError;

use super::devices::CaptureDevices;
use super::types::{
    CaptureStream, MediaConfig, MediaEvent, MediaKind, MediaSource, MediaState,
};

// ---------------------------------------------------------------------------
// Media Manager
// ---------------------------------------------------------------------------

/// Owns the camera and screen capture streams.
///
/// All mutation goes through `&mut self`; other components read
/// [`MediaState`] and never hold the streams themselves.
pub struct MediaManager {
    config: MediaConfig,
    devices: Arc<dyn CaptureDevices>,
    state: MediaState,
    /// `None` until the first camera request resolves.
    camera_permission: Option<bool>,
    startup_attempted: bool,
    /// Bumped on every successful share so stale end notices are ignored.
    share_id: u64,
    share_watch: Option<JoinHandle<()>>,
    event_tx: mpsc::Sender<MediaEvent>,
}

impl MediaManager {
    pub fn new(
        config: MediaConfig,
        devices: Arc<dyn CaptureDevices>,
    ) -> (Self, mpsc::Receiver<MediaEvent>) {
        let (event_tx, event_rx) = mpsc::channel(16);
        let mgr = Self {
            config,
            devices,
            state: MediaState::default(),
            camera_permission: None,
            startup_attempted: false,
            share_id: 0,
            share_watch: None,
            event_tx,
        };
        (mgr, event_rx)
    }

    pub fn state(&self) -> &MediaState {
        &self.state
    }

    pub fn live_source(&self) -> MediaSource {
        self.state.live_source
    }

    pub fn camera_permission(&self) -> Option<bool> {
        self.camera_permission
    }

    pub fn is_sharing(&self) -> bool {
        self.state.is_sharing()
    }

    /// The one automatic camera request made at startup.
    ///
    /// Returns `None` if it already ran or auto-acquisition is disabled;
    /// later attempts must come from [`acquire_camera`](Self::acquire_camera).
    pub async fn acquire_on_startup(&mut self) -> Option<Result<MediaSource, MediaError>> {
        if self.startup_attempted || !self.config.auto_acquire_camera {
            return None;
        }
        self.startup_attempted = true;
        Some(self.acquire_camera().await)
    }

    /// Request camera and microphone.
    ///
    /// An active camera stream is reused without asking again. The camera
    /// only becomes live when no screen share is running.
    pub async fn acquire_camera(&mut self) -> Result<MediaSource, MediaError> {
        if !self.state.camera_active() {
            match self.devices.open_camera().await {
                Ok(stream) => {
                    info!(tracks = stream.tracks().len(), "camera acquired");
                    self.state.camera = Some(stream);
                    self.camera_permission = Some(true);
                }
                Err(e) => {
                    warn!(error = %e, "camera acquisition failed");
                    self.state.camera = None;
                    self.camera_permission = Some(false);
                    if !self.is_sharing() {
                        self.state.live_source = MediaSource::None;
                    }
                    return Err(e);
                }
            }
        }

        if !self.is_sharing() {
            self.state.live_source = MediaSource::Camera;
        }
        Ok(MediaSource::Camera)
    }

    /// Start capturing the display. A running share is left as is.
    ///
    /// On failure nothing changes: the previous live source stays live.
    pub async fn start_screen_share(&mut self) -> Result<MediaSource, MediaError> {
        if self.is_sharing() {
            debug!("screen share already running");
            return Ok(MediaSource::ScreenShare);
        }

        let stream = self.devices.open_display(&self.config.share).await?;
        self.share_id += 1;
        let share_id = self.share_id;

        if let Some(video) = stream.video_track().cloned() {
            let tx = self.event_tx.clone();
            self.share_watch = Some(tokio::spawn(async move {
                video.ended().await;
                let _ = tx.send(MediaEvent::ScreenShareEnded { share_id }).await;
            }));
        }

        info!(share_id, audio = stream.audio_tracks().count(), "screen share started");
        self.state.screen = Some(stream);
        self.state.live_source = MediaSource::ScreenShare;
        Ok(MediaSource::ScreenShare)
    }

    /// Stop the screen share and restore the camera if it is still
    /// capturing. Returns `false` if nothing was being shared.
    pub fn stop_screen_share(&mut self) -> bool {
        let Some(screen) = self.state.screen.take() else {
            return false;
        };
        if let Some(watch) = self.share_watch.take() {
            watch.abort();
        }
        screen.stop();

        self.state.live_source = if self.state.camera_active() {
            MediaSource::Camera
        } else {
            MediaSource::None
        };
        info!(share_id = self.share_id, live = ?self.state.live_source, "screen share stopped");
        true
    }

    /// Apply a media event. Returns `true` if the live source changed.
    pub fn handle_event(&mut self, event: MediaEvent) -> bool {
        match event {
            MediaEvent::ScreenShareEnded { share_id } => {
                if share_id != self.share_id || !self.is_sharing() {
                    debug!(share_id, "ignoring stale screen share end");
                    return false;
                }
                info!(share_id, "screen share ended externally");
                self.stop_screen_share()
            }
        }
    }

    /// Toggle the enabled flag of the local tracks of `kind`.
    ///
    /// Video applies to the camera only and is not adjustable while
    /// sharing. Audio applies to whichever stream is live.
    pub fn set_track_enabled(&mut self, kind: MediaKind, enabled: bool) -> Result<(), MediaError> {
        let stream: Option<&CaptureStream> = match kind {
            MediaKind::Video if !self.is_sharing() => self.state.camera.as_ref(),
            MediaKind::Video => None,
            MediaKind::Audio => self.state.live_stream(),
        };

        match stream {
            Some(stream) if stream.is_active() => {
                let touched = stream.set_enabled(kind, enabled);
                debug!(?kind, enabled, touched, "track enablement changed");
                Ok(())
            }
            _ => Err(MediaError::DeviceUnavailable(
                "Local stream is not available to toggle.".into(),
            )),
        }
    }

    /// Stop every capture. The camera must be acquired again afterwards.
    pub fn release(&mut self) {
        self.stop_screen_share();
        if let Some(camera) = self.state.camera.take() {
            camera.stop();
            info!("camera released");
        }
        self.state.live_source = MediaSource::None;
    }
}

impl Drop for MediaManager {
    fn drop(&mut self) {
        if let Some(watch) = self.share_watch.take() {
            watch.abort();
        }
    }
}
