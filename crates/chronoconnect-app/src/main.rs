mod cli;
mod demo;
mod runtime;

use std::process::ExitCode;

use chronoconnect_common::AppError;
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command};
use crate::demo::DemoOptions;

/// Load environment variables from a .env file (KEY=VALUE lines), so API
/// keys for the summarizer can live next to the binary.
fn load_dotenv() {
    let manifest_dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let candidates = [
        // Workspace root, two levels up from crates/chronoconnect-app/
        manifest_dir.join("..").join("..").join(".env"),
        std::path::PathBuf::from(".env"),
    ];

    for path in &candidates {
        if let Ok(contents) = std::fs::read_to_string(path) {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    let key = key.trim();
                    let value = value.trim().trim_matches('"').trim_matches('\'');
                    if std::env::var(key).is_err() {
                        std::env::set_var(key, value);
                    }
                }
            }
            return;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    load_dotenv();
    let args = cli::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("chronoconnect: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> chronoconnect_common::Result<()> {
    let config = chronoconnect_config::load_config(args.config.as_deref())?;

    let directive = runtime::log_directive(args.log_level.as_deref(), config.logging.level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive)),
        )
        .init();

    tracing::info!("ChronoConnect v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &args.config {
        tracing::info!(path = %path.display(), "using config override");
    }

    if args.print_config {
        println!("{}", chronoconnect_config::config_to_json(&config));
        return Ok(());
    }

    let options = match args.command {
        Some(Command::Demo {
            summarize,
            deny_camera,
        }) => DemoOptions {
            summarize,
            deny_camera,
        },
        None => DemoOptions::default(),
    };
    let summarizer = if options.summarize {
        runtime::summarizer(&config)
    } else {
        None
    };

    demo::run(runtime::session_config(&config), summarizer, options)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "demo failed");
            AppError::Session(e.to_notification().to_string())
        })?;
    tracing::info!("Shutdown complete");
    Ok(())
}
