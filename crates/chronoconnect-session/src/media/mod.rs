//! Local media sources: camera/microphone and screen capture.
//!
//! [`MediaManager`] owns both capture streams and decides which one is live.
//! Capture hardware sits behind the [`CaptureDevices`] seam.

mod devices;
mod manager;
mod types;


pub use crate::error::MediaError;
pub use devices::{CaptureDevices, DeviceOutcome, VirtualDevices};
pub use manager::MediaManager;
pub use types::{
    CaptureStream, MediaConfig, MediaEvent, MediaKind, MediaSource, MediaState, MediaTrack,
    ScreenShareOptions, TrackState,
};
