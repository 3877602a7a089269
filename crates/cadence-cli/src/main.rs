//! Cadence CLI
//!
//! Command-line interface for scheduling and sending cadence messages
//! (§6's "CLI surface").

mod commands;
mod config;
mod contact_source;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use config::CliConfig;

/// Cadence CLI — schedule and send per-contact cadence messages.
#[derive(Parser, Debug)]
#[command(name = "cadence", version, about)]
struct Cli {
    /// `PostgreSQL` connection URL for the tracking store.
    #[arg(long, env = "CADENCE_DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Path to the rule configuration document (§6).
    #[arg(long, global = true)]
    rule_config: Option<PathBuf>,

    /// Path to the JSON contacts file (§6's "Contact input").
    #[arg(long, global = true)]
    contacts: Option<PathBuf>,

    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve scheduled and skipped intents for a window and persist them
    /// as a tracking batch (§4.3-§4.4).
    Schedule(commands::schedule::ScheduleArgs),
    /// Claim and send a chunk of pending rows from a batch (§4.6).
    Send(commands::send::SendArgs),
    /// Retry the failed rows of a batch (§4.6's `retryFailed`).
    Retry(commands::retry::RetryArgs),
    /// Report aggregate status for a batch (§4.5's `getBatch`).
    Status(commands::status::StatusArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = CliConfig::from_env();
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }
    if let Some(path) = cli.rule_config {
        config.rule_config_path = path;
    }
    if let Some(path) = cli.contacts {
        config.contacts_path = path;
    }

    let cancellation = CancellationToken::new();
    let shutdown = cancellation.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    match cli.command {
        Command::Schedule(args) => commands::schedule::run(&config, &args, &cli.format, &cancellation).await,
        Command::Send(args) => commands::send::run(&config, &args, &cli.format, &cancellation).await,
        Command::Retry(args) => commands::retry::run(&config, &args, &cli.format, &cancellation).await,
        Command::Status(args) => commands::status::run(&config, &args, &cli.format).await,
    }
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, then returns so callers can cancel
/// in-flight scheduling and delivery work (§9's cancellation cascade).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
