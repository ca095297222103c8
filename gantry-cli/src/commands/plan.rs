//! Plan command handler
//!
//! Evaluates triggers against the described event without executing
//! anything, showing which pipelines would run and in what order.

use std::path::Path;

use anyhow::{Context, Result};
use colored::*;

use gantry_core::config;
use gantry_engine::graph::PipelineGraph;

use crate::event::EventArgs;

pub fn handle_plan(config_path: &Path, event: &EventArgs) -> Result<()> {
    let pipelines = config::load_path(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let graph = PipelineGraph::build(&pipelines).context("Dependency graph is invalid")?;
    let ctx = event.to_context();

    println!(
        "Event: {} (branch: {}, ref: {})",
        ctx.event.to_string().bold(),
        ctx.branch.as_deref().unwrap_or("-"),
        ctx.git_ref.as_deref().unwrap_or("-")
    );

    for name in graph.topo_order() {
        let Some(pipeline) = pipelines.iter().find(|p| p.name == name) else {
            continue;
        };

        if !pipeline.trigger.matches_ignoring_status(&ctx) {
            println!("  {} {}", "skip".dimmed(), pipeline.name.dimmed());
        } else if pipeline.trigger.has_status_clause() {
            println!(
                "  {} {} {}",
                "defer".yellow(),
                pipeline.name.bold(),
                "(gated on upstream status)".dimmed()
            );
        } else {
            println!("  {} {}", "run".green(), pipeline.name.bold());
        }
    }

    Ok(())
}
