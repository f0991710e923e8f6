//! Capture device seam and an in-process implementation.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::error::MediaError;

use super::types::{CaptureStream, MediaKind, MediaTrack, ScreenShareOptions};

/// Source of camera/microphone and display capture streams.
#[async_trait]
pub trait CaptureDevices: Send + Sync {
    /// Open camera video plus microphone audio.
    async fn open_camera(&self) -> Result<CaptureStream, MediaError>;

    /// Open a display capture with optional system audio.
    async fn open_display(&self, options: &ScreenShareOptions)
        -> Result<CaptureStream, MediaError>;
}

// ---------------------------------------------------------------------------
// Virtual devices
// ---------------------------------------------------------------------------

/// How a virtual capture request resolves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeviceOutcome {
    #[default]
    Grant,
    Deny,
    Unavailable,
    Disallow,
}

#[derive(Default)]
struct VirtualState {
    camera: DeviceOutcome,
    display: DeviceOutcome,
    camera_requests: u32,
    display_requests: u32,
    last_display: Option<CaptureStream>,
    last_options: Option<ScreenShareOptions>,
}

/// Scriptable capture devices producing synthetic tracks.
#[derive(Default)]
pub struct VirtualDevices {
    state: Mutex<VirtualState>,
}

impl VirtualDevices {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VirtualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_camera(&self, outcome: DeviceOutcome) {
        self.lock().camera = outcome;
    }

    pub fn set_display(&self, outcome: DeviceOutcome) {
        self.lock().display = outcome;
    }

    pub fn camera_requests(&self) -> u32 {
        self.lock().camera_requests
    }

    pub fn display_requests(&self) -> u32 {
        self.lock().display_requests
    }

    pub fn last_display_options(&self) -> Option<ScreenShareOptions> {
        self.lock().last_options
    }

    /// End the most recent display capture from outside, the way a
    /// platform "stop sharing" control would. Returns `false` if there was
    /// nothing live to end.
    pub fn end_display_capture(&self) -> bool {
        match self.lock().last_display.take() {
            Some(stream) if stream.is_active() => {
                stream.stop();
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl CaptureDevices for VirtualDevices {
    async fn open_camera(&self) -> Result<CaptureStream, MediaError> {
        let mut state = self.lock();
        state.camera_requests += 1;
        debug!(outcome = ?state.camera, "virtual camera request");

        match state.camera {
            DeviceOutcome::Grant => Ok(CaptureStream::new(vec![
                MediaTrack::new(MediaKind::Video, "virtual camera"),
                MediaTrack::new(MediaKind::Audio, "virtual microphone"),
            ])),
            DeviceOutcome::Deny => Err(MediaError::PermissionDenied(
                "camera and microphone access was denied".into(),
            )),
            DeviceOutcome::Unavailable => Err(MediaError::DeviceUnavailable(
                "no camera or microphone is available".into(),
            )),
            DeviceOutcome::Disallow => Err(MediaError::PolicyDisallowed(
                "camera access is disallowed by a permissions policy".into(),
            )),
        }
    }

    async fn open_display(
        &self,
        options: &ScreenShareOptions,
    ) -> Result<CaptureStream, MediaError> {
        let mut state = self.lock();
        state.display_requests += 1;
        state.last_options = Some(*options);
        debug!(outcome = ?state.display, "virtual display request");

        match state.display {
            DeviceOutcome::Grant => {
                let mut tracks = vec![MediaTrack::new(MediaKind::Video, "virtual display")];
                if options.capture_audio {
                    tracks.push(MediaTrack::new(MediaKind::Audio, "virtual system audio"));
                }
                let stream = CaptureStream::new(tracks);
                state.last_display = Some(stream.clone());
                Ok(stream)
            }
            DeviceOutcome::Deny => Err(MediaError::PermissionDenied(
                "Screen sharing permission was denied. Allow screen sharing and try again.".into(),
            )),
            DeviceOutcome::Disallow => Err(MediaError::PolicyDisallowed(
                "Screen sharing is disallowed by a permissions policy.".into(),
            )),
            DeviceOutcome::Unavailable => {
                Err(MediaError::Capture("no display is available to capture".into()))
            }
        }
    }
}
