//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod plan;
mod run;
mod validate;

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use crate::event::EventArgs;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Validate a configuration file and its dependency graph
    Validate {
        /// Path to the pipeline configuration file
        config: PathBuf,
    },
    /// Show which pipelines an event would schedule, in dependency order
    Plan {
        /// Path to the pipeline configuration file
        config: PathBuf,

        #[command(flatten)]
        event: EventArgs,
    },
    /// Execute the pipelines an event schedules
    Run {
        /// Path to the pipeline configuration file
        config: PathBuf,

        #[command(flatten)]
        event: EventArgs,

        /// Succeed every step without running containers
        #[arg(long)]
        no_exec: bool,

        /// Base directory for workspaces and volumes
        #[arg(long, env = "GANTRY_WORKSPACE")]
        workspace: Option<PathBuf>,

        /// Per-step timeout in seconds
        #[arg(long, default_value = "1800")]
        step_timeout: u64,

        /// Chat webhook URL notified for every terminal run
        #[arg(long, env = "GANTRY_WEBHOOK_URL")]
        webhook: Option<String>,

        /// Webhook message template
        #[arg(long)]
        message: Option<String>,

        /// Directory of artifacts to upload after successful runs
        #[arg(long)]
        artifact_dir: Option<PathBuf>,

        /// Object store endpoint receiving artifact uploads
        #[arg(long, env = "GANTRY_ARTIFACT_ENDPOINT")]
        artifact_endpoint: Option<String>,

        /// Print the run records as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
}

/// Routes a command to its handler
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Validate { config } => validate::handle_validate(&config),
        Commands::Plan { config, event } => plan::handle_plan(&config, &event),
        Commands::Run {
            config,
            event,
            no_exec,
            workspace,
            step_timeout,
            webhook,
            message,
            artifact_dir,
            artifact_endpoint,
            json,
        } => {
            run::handle_run(run::RunOptions {
                config,
                event,
                no_exec,
                workspace,
                step_timeout,
                webhook,
                message,
                artifact_dir,
                artifact_endpoint,
                json,
            })
            .await
        }
    }
}
