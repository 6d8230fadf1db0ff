//! Watch-mode rebuild loop.
//!
//! Consumes batches of changed paths, routes them to bindings and runs each
//! binding's plan. A binding never runs twice at the same time: a batch that
//! arrives while it is running marks it pending, and any number of such
//! batches collapse into a single follow-up run. Different bindings may run
//! concurrently. Runs are never cancelled.
//!
//! After a successful run the reload sink is notified exactly once with the
//! binding's scope. Failed runs are logged and produce no notification, so
//! browsers keep showing the last good output.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::executor::{Executor, RunReport, StepExecutionError};
use crate::router::{BindingId, ChangeRouter, ReloadScope};

/// A reload signal for connected clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reload {
    /// Refresh the whole page
    Full,

    /// Swap the listed assets (paths relative to the output root)
    Stream { assets: Vec<String> },
}

/// Receiver of reload signals, implemented by the dev session.
pub trait ReloadSink: Send + Sync {
    fn notify(&self, reload: Reload);
}

/// Counters describing what a scheduler did over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub runs: usize,
    pub failures: usize,
    pub notifications: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindingState {
    Idle,
    Running { pending: bool },
}

type Completion = (BindingId, Result<RunReport, StepExecutionError>);

/// Drives incremental rebuilds for a [`ChangeRouter`].
pub struct RebuildScheduler {
    router: Arc<ChangeRouter>,
    sink: Arc<dyn ReloadSink>,
    output_root: PathBuf,
    states: Vec<BindingState>,
    stats: RebuildStats,
}

impl RebuildScheduler {
    pub fn new(
        router: Arc<ChangeRouter>,
        sink: Arc<dyn ReloadSink>,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        let states = vec![BindingState::Idle; router.bindings().len()];
        Self {
            router,
            sink,
            output_root: output_root.into(),
            states,
            stats: RebuildStats::default(),
        }
    }

    /// Process batches until the sender side closes, then wait for in-flight
    /// runs (and their pending follow-ups) to finish.
    pub async fn run(mut self, mut batches: mpsc::Receiver<Vec<PathBuf>>) -> RebuildStats {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
        let mut inputs_open = true;

        loop {
            if !inputs_open && self.is_idle() {
                break;
            }

            tokio::select! {
                batch = batches.recv(), if inputs_open => match batch {
                    Some(paths) => self.on_batch(&paths, &done_tx),
                    None => {
                        tracing::debug!("change stream closed");
                        inputs_open = false;
                    }
                },
                Some((id, result)) = done_rx.recv() => self.on_complete(id, result, &done_tx),
            }
        }

        tracing::debug!(stats = ?self.stats, "rebuild scheduler stopped");
        self.stats
    }

    fn is_idle(&self) -> bool {
        self.states.iter().all(|s| *s == BindingState::Idle)
    }

    fn on_batch(&mut self, paths: &[PathBuf], done_tx: &mpsc::UnboundedSender<Completion>) {
        let ids = self.router.route(paths);
        if ids.is_empty() {
            return;
        }

        for path in paths {
            tracing::info!("Changed: {}", path.display());
        }

        for id in ids {
            let state = self.states[id.0];
            match state {
                BindingState::Idle => self.start(id, done_tx),
                BindingState::Running { .. } => {
                    tracing::debug!(
                        binding = %self.router.binding(id).name(),
                        "binding busy, queueing rerun"
                    );
                    self.states[id.0] = BindingState::Running { pending: true };
                }
            }
        }
    }

    fn start(&mut self, id: BindingId, done_tx: &mpsc::UnboundedSender<Completion>) {
        self.states[id.0] = BindingState::Running { pending: false };
        self.stats.runs += 1;

        let router = Arc::clone(&self.router);
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            let binding = router.binding(id);
            let start = Instant::now();
            let result = Executor::new().execute(binding.plan()).await;
            if result.is_ok() {
                tracing::info!(
                    "Rebuilt '{}' in {} ms",
                    binding.name(),
                    start.elapsed().as_millis()
                );
            }
            if done_tx.send((id, result)).is_err() {
                tracing::debug!("'{}' finished after the rebuild loop stopped", binding.name());
            }
        });
    }

    fn on_complete(
        &mut self,
        id: BindingId,
        result: Result<RunReport, StepExecutionError>,
        done_tx: &mpsc::UnboundedSender<Completion>,
    ) {
        let binding = self.router.binding(id);

        match result {
            Ok(report) => {
                let reload = match binding.reload() {
                    ReloadScope::Full => Reload::Full,
                    ReloadScope::Stream => Reload::Stream {
                        assets: relative_assets(&self.output_root, &report.written),
                    },
                };
                self.sink.notify(reload);
                self.stats.notifications += 1;
            }
            Err(err) => {
                tracing::error!(
                    "Rebuild of '{}' failed, keeping previous output: {}",
                    binding.name(),
                    err
                );
                self.stats.failures += 1;
            }
        }

        let pending = matches!(self.states[id.0], BindingState::Running { pending: true });
        self.states[id.0] = BindingState::Idle;
        if pending {
            self.start(id, done_tx);
        }
    }
}

fn relative_assets(root: &Path, written: &[PathBuf]) -> Vec<String> {
    written
        .iter()
        .map(|path| {
            path.strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}
