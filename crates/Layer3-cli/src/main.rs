//! AutoHub CLI - Main entry point

mod commands;

use clap::{Parser, Subcommand};
use hub_foundation::HubConfig;
use hub_task::Hub;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// AutoHub - supervise polling automations and one-shot scripts
#[derive(Parser, Debug)]
#[command(name = "autohub")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Load configuration from this file instead of the global/project files
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List automation types and their config fields
    Types,
    /// List runnable scripts
    Scripts,
    /// Start a script run
    RunScript {
        /// Script filename inside the scripts directory
        filename: String,

        /// Wait for the run to finish and print the final record
        #[arg(short, long)]
        follow: bool,
    },
    /// Create and start an automation, then stream its status until Ctrl-C
    Watch {
        /// Automation type, e.g. NewsMonitorAutomation
        kind: String,

        /// Config value as key=value (repeatable)
        #[arg(short, long = "set", value_parser = commands::parse_setting)]
        settings: Vec<(String, serde_json::Value)>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(args).await {
        let (code, status) = commands::error_code(&err);
        eprintln!("error[{}]: {:#}", code, err);
        std::process::exit(status);
    }
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    // Load configuration
    let config = match &args.config {
        Some(path) => HubConfig::from_file(path)?,
        None => HubConfig::load()?,
    };

    let hub = Hub::new(config)?;

    match args.command {
        Command::Types => commands::types(&hub),
        Command::Scripts => commands::scripts(&hub).await,
        Command::RunScript { filename, follow } => {
            commands::run_script(&hub, &filename, follow).await
        }
        Command::Watch { kind, settings } => commands::watch(&hub, &kind, settings).await,
    }
}
