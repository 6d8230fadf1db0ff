//! Development mode: build, serve, rebuild on change.

use std::sync::Arc;

use anyhow::{Context, Result};
use kiln_server::{DevSession, DevSessionConfig, FileWatcher, RELOAD_SCRIPT_PATH};
use kiln_static::{build_graph, watch_bindings, BuildConfig};
use kiln_tasks::{ChangeRouter, RebuildScheduler};

/// Run the dev command until Ctrl-C.
pub async fn run(mut config: BuildConfig, port: Option<u16>, open: bool) -> Result<()> {
    if !config.is_production() {
        config.reload_script = Some(RELOAD_SCRIPT_PATH.to_string());
    }
    let config = Arc::new(config);
    let graph = build_graph(&config)?;

    // nothing is watched or served until the first build succeeds
    super::build::build(&graph).await?;

    let session = DevSession::start(DevSessionConfig {
        output_dir: config.output_dir.clone(),
        port: port.unwrap_or(config.port),
        open,
        ..Default::default()
    })
    .await?;

    let router = ChangeRouter::new(
        &config.source_root,
        &[config.output_dir.clone()],
        &watch_bindings(&config),
        &graph,
    )?;
    let (watcher, batches) =
        FileWatcher::new(&config.source_root).context("Failed to watch source directory")?;

    let scheduler = RebuildScheduler::new(
        Arc::new(router),
        Arc::new(session.hub()),
        config.output_dir.clone(),
    );
    let rebuilds = tokio::spawn(scheduler.run(batches));

    tracing::info!("Watching {} for changes", config.source_root.display());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down...");

    // closing the batch channel lets in-flight rebuilds finish
    drop(watcher);
    let stats = rebuilds.await.context("Rebuild loop panicked")?;
    tracing::debug!(?stats, "rebuild summary");

    session.shutdown().await;
    Ok(())
}
