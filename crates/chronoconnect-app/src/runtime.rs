//! Turns the file configuration into the runtime settings the session
//! core and the summarizer take.

use std::sync::Arc;
use std::time::Duration;

use chronoconnect_ai::{client_from_env, ChatSummarizer, Provider, ProviderSettings, Summarizer};
use chronoconnect_config::{AiProvider, ChronoConnectConfig, LogLevel};
use chronoconnect_session::media::ScreenShareOptions;
use chronoconnect_session::{ChatConfig, MediaConfig, SessionConfig, TransportConfig};
use tracing::warn;

const DEFAULT_DIRECTIVE_TARGET: &str = "chronoconnect";

pub fn session_config(config: &ChronoConnectConfig) -> SessionConfig {
    SessionConfig {
        media: MediaConfig {
            auto_acquire_camera: config.media.auto_acquire_camera,
            share: ScreenShareOptions {
                capture_audio: config.media.share_audio,
                suppress_local_audio_playback: config.media.suppress_local_audio_playback,
                show_cursor: config.media.show_cursor,
            },
        },
        transport: TransportConfig {
            collision_backoff: Duration::from_millis(u64::from(config.transport.collision_backoff_ms)),
            max_collision_retries: config.transport.max_collision_retries,
            event_buffer: config.transport.event_buffer as usize,
        },
        chat: ChatConfig {
            connect_on_call: config.chat.connect_on_call,
            timestamp_format: config.chat.timestamp_format.clone(),
        },
    }
}

pub fn provider_settings(config: &ChronoConnectConfig) -> ProviderSettings {
    ProviderSettings {
        provider: match config.ai.provider {
            AiProvider::Claude => Provider::Claude,
            AiProvider::Gemini => Provider::Gemini,
        },
        model: config.ai.model.clone(),
        max_tokens: config.ai.max_tokens,
        temperature: config.ai.temperature,
    }
}

/// Build the summarizer, or `None` when the provider has no credentials.
pub fn summarizer(config: &ChronoConnectConfig) -> Option<Arc<dyn Summarizer>> {
    match client_from_env(&provider_settings(config)) {
        Ok(client) => Some(Arc::new(ChatSummarizer::new(client))),
        Err(e) => {
            warn!(error = %e, "summaries disabled");
            None
        }
    }
}

/// The log filter to use when `RUST_LOG` is unset: the `--log-level` flag
/// if given, otherwise the config file's level.
pub fn log_directive(flag: Option<&str>, level: LogLevel) -> String {
    match flag {
        Some(flag) if flag.contains('=') => flag.to_string(),
        Some(flag) => format!("{DEFAULT_DIRECTIVE_TARGET}={flag}"),
        None => format!("{DEFAULT_DIRECTIVE_TARGET}={}", level.as_directive()),
    }
}
