//! Chat channel settings.

use serde::{Deserialize, Serialize};

/// `[chat]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Open a chat channel to the remote whenever a call is placed.
    pub connect_on_call: bool,
    /// `chrono` format string used for message timestamps.
    pub timestamp_format: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            connect_on_call: true,
            timestamp_format: "%-I:%M %p".into(),
        }
    }
}
