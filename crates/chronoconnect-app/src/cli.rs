use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// ChronoConnect: peer-to-peer calls with chat and screen sharing.
#[derive(Parser, Debug)]
#[command(name = "chronoconnect", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error, or a filter
    /// directive). `RUST_LOG` still wins.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    pub print_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run two endpoints in-process and walk them through a call.
    Demo {
        /// Ask the configured AI provider to summarize the demo chat.
        #[arg(long)]
        summarize: bool,

        /// Make the caller's camera request fail.
        #[arg(long)]
        deny_camera: bool,
    },
}

pub fn parse() -> Args {
    Args::parse()
}
