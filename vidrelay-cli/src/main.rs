//! Vidrelay CLI - Command-line interface
//!
//! Runs the relay server and exposes resolution and search for quick
//! checks against the configured mirrors.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use vidrelay_core::RelayConfig;
use vidrelay_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "vidrelay")]
#[command(about = "Video metadata relay with mirror failover")]
struct Cli {
    /// Console log level (RUST_LOG takes precedence)
    #[arg(long, global = true, value_enum, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    /// Write a full trace log of this run into this directory
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    /// Upstream mirror URL, repeatable; replaces the configured mirror list
    #[arg(long = "mirror", global = true)]
    mirrors: Vec<String>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())
        .context("Failed to initialize logging")?;

    let mut config = RelayConfig::from_env();
    if !cli.mirrors.is_empty() {
        config.upstream.mirrors = cli.mirrors;
    }

    commands::handle_command(cli.command, config).await
}
