//! CLI entry point for getbooks.

use std::io::{self, IsTerminal};

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod app_config;
mod cli;
mod commands;
mod progress;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?cli, "CLI arguments parsed");

    let mut registry = app_config::load_registry(cli.config.as_deref())?;
    app_config::register_volumes(&mut registry, &cli.mount_roots);

    let show_progress = !cli.quiet && io::stderr().is_terminal();
    match &cli.command {
        Command::Sources => commands::run_sources_command(&registry),
        Command::Search(args) => commands::run_search_command(&registry, args, show_progress).await,
        Command::Get(args) => commands::run_get_command(&registry, args, show_progress).await,
    }
}
