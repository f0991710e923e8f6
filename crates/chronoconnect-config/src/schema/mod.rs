//! Configuration schema.
//!
//! One struct per TOML table. All structs are `#[serde(default)]`.

mod ai;
mod chat;
mod media;
mod system;
mod transport;

pub use ai::{AiConfig, AiProvider};
pub use chat::ChatConfig;
pub use media::MediaConfig;
pub use system::{LogLevel, LoggingConfig};
pub use transport::TransportConfig;

use serde::{Deserialize, Serialize};

/// Root configuration, one field per `[table]` in `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChronoConnectConfig {
    pub media: MediaConfig,
    pub transport: TransportConfig,
    pub chat: ChatConfig,
    pub ai: AiConfig,
    pub logging: LoggingConfig,
}
