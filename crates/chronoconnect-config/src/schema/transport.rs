//! Peer transport settings.

use serde::{Deserialize, Serialize};

/// `[transport]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Delay before re-registering after an identity collision (valid range: 100-60000).
    pub collision_backoff_ms: u32,
    /// Re-registration attempts before giving up (valid range: 1-100).
    pub max_collision_retries: u32,
    /// Capacity of internal event channels (valid range: 8-4096).
    pub event_buffer: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            collision_backoff_ms: 1000,
            max_collision_retries: 5,
            event_buffer: 256,
        }
    }
}
