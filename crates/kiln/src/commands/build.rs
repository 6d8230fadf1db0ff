//! One-shot site build.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use kiln_static::{build_graph, pipeline::BUILD, BuildConfig};
use kiln_tasks::{RunReport, TaskGraph};

/// Run the build command.
pub async fn run(config: BuildConfig) -> Result<()> {
    tracing::info!("Building site...");

    let config = Arc::new(config);
    let graph = build_graph(&config)?;
    build(&graph).await?;

    tracing::info!("Output: {}", config.output_dir.display());
    Ok(())
}

/// Run the `build` aggregate and log a summary.
///
/// The first failing step aborts the build; its name and cause end up in the
/// returned error.
pub async fn build(graph: &TaskGraph) -> Result<RunReport> {
    let started = Instant::now();

    let report = graph.run(BUILD).await.inspect_err(|e| {
        tracing::error!("Build failed: {}", e);
    })?;

    tracing::info!(
        "Built in {} ms, {} files written",
        started.elapsed().as_millis(),
        report.written.len()
    );
    Ok(report)
}
