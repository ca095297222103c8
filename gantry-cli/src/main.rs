//! Gantry CLI
//!
//! Command-line interface for the Gantry pipeline engine: validate a
//! configuration, plan what an event would schedule, or execute it.

mod commands;
mod event;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gantry")]
#[command(about = "Gantry CI pipeline engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gantry_engine=info,gantry_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    handle_command(cli.command).await
}
