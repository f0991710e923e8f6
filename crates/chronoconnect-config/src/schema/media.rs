//! Local capture settings.

use serde::{Deserialize, Serialize};

/// `[media]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Acquire the camera as soon as the session starts.
    pub auto_acquire_camera: bool,
    /// Request system audio alongside the display capture.
    pub share_audio: bool,
    /// Ask the platform not to play captured system audio back locally.
    pub suppress_local_audio_playback: bool,
    pub show_cursor: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            auto_acquire_camera: true,
            share_audio: true,
            suppress_local_audio_playback: true,
            show_cursor: true,
        }
    }
}
