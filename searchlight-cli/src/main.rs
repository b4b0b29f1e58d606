//! Searchlight CLI - Command-line interface
//!
//! Runs the search server, or answers a single query from the terminal.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use searchlight_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "searchlight")]
#[command(about = "Local file search with range streaming and live transcoding")]
struct Cli {
    /// Console log level; RUST_LOG takes precedence when set
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info, global = true)]
    log_level: CliLogLevel,

    /// Directory for the full trace log of this run
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.into(), cli.logs_dir.as_deref())
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    commands::handle_command(cli.command).await
}
