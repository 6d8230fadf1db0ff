//! File watching for rebuilds.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Window in which raw events are collected into one batch.
pub const BATCH_WINDOW: Duration = Duration::from_millis(100);

/// Recursive watcher that delivers changed paths in batches.
///
/// Events arriving within [`BATCH_WINDOW`] of the first event of a batch are
/// merged and de-duplicated, so an editor's write-rename-chmod sequence
/// reaches the scheduler as a single batch.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch `root` recursively.
    ///
    /// Returns the watcher and a channel of path batches. The channel closes
    /// once the watcher is dropped.
    pub fn new(
        root: &Path,
    ) -> Result<(Self, async_mpsc::Receiver<Vec<PathBuf>>), notify::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            match res {
                Ok(event) => {
                    let _ = sync_tx.send(event);
                }
                Err(e) => tracing::warn!("watch error: {}", e),
            }
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        std::thread::spawn(move || {
            while let Ok(first) = sync_rx.recv() {
                let mut batch = BTreeSet::new();
                collect(&mut batch, first);

                let deadline = Instant::now() + BATCH_WINDOW;
                loop {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match sync_rx.recv_timeout(remaining) {
                        Ok(event) => collect(&mut batch, event),
                        Err(_) => break,
                    }
                }

                if batch.is_empty() {
                    continue;
                }
                if async_tx.blocking_send(batch.into_iter().collect()).is_err() {
                    break;
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Add the paths of a content-changing event to `batch`.
fn collect(batch: &mut BTreeSet<PathBuf>, event: notify::Event) {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
            batch.extend(event.paths);
        }
        _ => {}
    }
}
