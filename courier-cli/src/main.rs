//! Courier: watch the Messages database and report what changed.
//!
//! # Usage
//!
//! ```text
//! courier watch [--json]
//! courier poll [--since-minutes N] [--json]
//! courier config show
//! courier config init [--force]
//!
//! global: --database <path>  -v/-vv  --log-json
//! ```

mod commands;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{config::ConfigCommand, poll::PollArgs, watch::WatchArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "courier",
    version,
    about = "Detect and correlate changes in the Messages chat database",
    long_about = None,
)]
struct Cli {
    /// Path to chat.db; overrides the config file.
    #[arg(long, global = true, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` wins.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the listener and print notifications until interrupted.
    Watch(WatchArgs),

    /// Run a single poll cycle over a recent window and print its events.
    Poll(PollArgs),

    /// Inspect or create `~/.courier/config.yaml`.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    courier_listener::init_tracing(level, cli.log_json);

    let database = cli.database;
    match cli.command {
        Commands::Watch(args) => args.run(database),
        Commands::Poll(args) => args.run(database),
        Commands::Config { command } => commands::config::run(command, database),
    }
}
