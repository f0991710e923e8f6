//! Default TOML config template with inline documentation comments.

/// The default config file contents. Every value is commented out so the
/// file documents the defaults without pinning them.
pub(crate) fn default_config_toml() -> String {
    r##"# ChronoConnect configuration
# Only override what you want to change -- missing fields use defaults.

[media]
# auto_acquire_camera = true
# share_audio = true                     # capture system audio with the screen
# suppress_local_audio_playback = true
# show_cursor = true

[transport]
# collision_backoff_ms = 1000            # 100-60000
# max_collision_retries = 5              # 1-100
# event_buffer = 256                     # 8-4096

[chat]
# connect_on_call = true
# timestamp_format = "%-I:%M %p"

[ai]
# provider = "gemini"                    # "gemini" or "claude"
# model = "gemini-2.0-flash"
# max_tokens = 512                       # 64-8192
# temperature = 0.3                      # 0.0-2.0

[logging]
# level = "info"                         # trace, debug, info, warn, error
"##
    .to_string()
}
