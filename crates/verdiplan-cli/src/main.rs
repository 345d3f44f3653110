//! Verdiplan CLI - Command-line interface for the offline store
//!
//! Provides commands for:
//! - Capturing media and queueing task changes while offline
//! - Viewing pending work and connectivity
//! - Running a sync pass on demand
//! - Refreshing and browsing task snapshots
//! - Cleaning up uploaded media
//! - Managing the API token and configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    auth::AuthCommand, capture::CaptureCommand, cleanup::CleanupCommand, config::ConfigCommand,
    queue::QueueCommand, snapshots::SnapshotsCommand, status::StatusCommand, sync::SyncCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "verdiplan", version, about = "Offline store and sync for Verdiplan")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show pending work and connectivity
    Status(StatusCommand),
    /// Upload pending media and replay queued actions now
    Sync(SyncCommand),
    /// Store a photo for a task until it can be uploaded
    Capture(CaptureCommand),
    /// Inspect and manage the action queue
    #[command(subcommand)]
    Queue(QueueCommand),
    /// Refresh and browse cached task snapshots
    #[command(subcommand)]
    Snapshots(SnapshotsCommand),
    /// Delete uploaded media older than the retention period
    Cleanup(CleanupCommand),
    /// Manage the API token
    #[command(subcommand)]
    Auth(AuthCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays parseable
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = OutputFormat::from_json_flag(cli.json);
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Status(cmd) => cmd.execute(config, format).await,
        Commands::Sync(cmd) => cmd.execute(config, format).await,
        Commands::Capture(cmd) => cmd.execute(config, format).await,
        Commands::Queue(cmd) => cmd.execute(config, format).await,
        Commands::Snapshots(cmd) => cmd.execute(config, format).await,
        Commands::Cleanup(cmd) => cmd.execute(config, format).await,
        Commands::Auth(cmd) => cmd.execute(config, format).await,
        Commands::Config(cmd) => cmd.execute(config, format).await,
    }
}
