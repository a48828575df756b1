//! CLI module for Eventscope
//!
//! The server is the default command; `serve` exists so scripts can be
//! explicit about it.

use clap::{Parser, Subcommand};

/// Eventscope CLI
#[derive(Parser, Debug)]
#[command(name = "eventscope")]
#[command(about = "Kubernetes event watcher with live streaming and searchable history")]
#[command(version)]
pub struct Cli {
    /// Override the listen port from the configuration
    #[arg(long, global = true)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server (default)
    Serve,
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Serve) | None => crate::server::run(cli.port).await,
    }
}
