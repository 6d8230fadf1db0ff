//! Runs resolved task trees with series/parallel semantics.

use std::any::Any;
use std::path::PathBuf;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};

use crate::graph::{Node, TaskNode};
use crate::step::StepError;

/// What a successful run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Leaf tasks that completed, in completion order
    pub steps: Vec<String>,

    /// Every file written by those tasks
    pub written: Vec<PathBuf>,
}

impl RunReport {
    fn merge(&mut self, other: RunReport) {
        self.steps.extend(other.steps);
        self.written.extend(other.written);
    }
}

/// A step failed; carries the originating step and the underlying cause.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("step '{step}' failed: {cause}")]
pub struct StepExecutionError {
    pub step: String,
    #[source]
    pub cause: StepError,
}

/// Executes [`Node`] trees.
///
/// Leaves run on tokio's blocking pool. The executor itself holds no state
/// and has no side effects beyond sequencing and failure propagation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Executor;

impl Executor {
    pub fn new() -> Self {
        Self
    }

    /// Run `node` to completion.
    ///
    /// A series stops at its first failing child. A parallel group always
    /// waits for every child and reports the first failure it observed.
    pub fn execute<'a>(
        &'a self,
        node: &'a Node,
    ) -> BoxFuture<'a, Result<RunReport, StepExecutionError>> {
        match node {
            Node::Task(task) => self.run_task(task).boxed(),
            Node::Series(children) => self.run_series(children).boxed(),
            Node::Parallel(children) => self.run_parallel(children).boxed(),
        }
    }

    async fn run_task(&self, task: &TaskNode) -> Result<RunReport, StepExecutionError> {
        let name = task.name().to_string();
        let step = task.step();
        let start = Instant::now();

        tracing::info!("Starting '{}'...", name);

        let outcome = tokio::task::spawn_blocking(move || step.run()).await;
        let result = match outcome {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => {
                Err(StepError::Panicked(panic_message(join_err.into_panic())))
            }
            Err(join_err) => Err(StepError::Panicked(join_err.to_string())),
        };

        match result {
            Ok(output) => {
                tracing::info!(
                    "Finished '{}' after {} ms",
                    name,
                    start.elapsed().as_millis()
                );
                Ok(RunReport {
                    steps: vec![name],
                    written: output.written,
                })
            }
            Err(cause) => {
                tracing::error!(
                    "'{}' errored after {} ms: {}",
                    name,
                    start.elapsed().as_millis(),
                    cause
                );
                Err(StepExecutionError { step: name, cause })
            }
        }
    }

    async fn run_series(&self, children: &[Node]) -> Result<RunReport, StepExecutionError> {
        let mut report = RunReport::default();
        for child in children {
            report.merge(self.execute(child).await?);
        }
        Ok(report)
    }

    async fn run_parallel(&self, children: &[Node]) -> Result<RunReport, StepExecutionError> {
        let mut pending: FuturesUnordered<_> =
            children.iter().map(|child| self.execute(child)).collect();

        let mut report = RunReport::default();
        let mut first_failure: Option<StepExecutionError> = None;

        while let Some(result) = pending.next().await {
            match result {
                Ok(child) => report.merge(child),
                Err(err) if first_failure.is_none() => first_failure = Some(err),
                Err(err) => {
                    tracing::debug!(step = %err.step, "additional failure in parallel group");
                }
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
