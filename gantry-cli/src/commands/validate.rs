//! Validate command handler

use std::path::Path;

use anyhow::{Context, Result};
use colored::*;

use gantry_core::config;
use gantry_engine::graph::PipelineGraph;

/// Loads a configuration and rejects dangling dependencies and cycles
pub fn handle_validate(config_path: &Path) -> Result<()> {
    let pipelines = config::load_path(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let graph = PipelineGraph::build(&pipelines).context("Dependency graph is invalid")?;

    println!(
        "{} {} pipeline(s)",
        "✓ Configuration is valid:".green().bold(),
        pipelines.len()
    );

    for name in graph.topo_order() {
        let Some(pipeline) = pipelines.iter().find(|p| p.name == name) else {
            continue;
        };

        let deps = if pipeline.depends_on.is_empty() {
            String::new()
        } else {
            format!(" <- {}", pipeline.depends_on.join(", "))
        };

        println!(
            "  {} ({} step(s)){}",
            pipeline.name.bold(),
            pipeline.steps.len(),
            deps.dimmed()
        );
    }

    Ok(())
}
