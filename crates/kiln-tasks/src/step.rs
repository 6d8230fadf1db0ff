//! The contract between the orchestrator and the leaf transformations.

use std::path::PathBuf;

/// Files produced by a single step invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutput {
    /// Paths written, absolute or relative to the working directory
    pub written: Vec<PathBuf>,
}

impl StepOutput {
    /// An output that wrote nothing (e.g. a cache flush).
    pub fn empty() -> Self {
        Self::default()
    }

    /// An output listing the files that were written.
    pub fn with_files(written: Vec<PathBuf>) -> Self {
        Self { written }
    }
}

/// Why a transform step failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    #[error("render failed: {0}")]
    Render(String),

    #[error("transform failed: {0}")]
    Transform(String),

    #[error("bundle failed: {0}")]
    Bundle(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("step panicked: {0}")]
    Panicked(String),
}

impl From<std::io::Error> for StepError {
    fn from(err: std::io::Error) -> Self {
        StepError::Io(err.to_string())
    }
}

/// A unit of work the orchestrator can schedule.
///
/// Steps know nothing about the graph they are placed in. They are invoked on
/// the blocking pool, so implementations are free to do synchronous IO and to
/// fan out internally.
pub trait TransformStep: Send + Sync {
    /// Run the transformation once.
    fn run(&self) -> Result<StepOutput, StepError>;
}

impl<F> TransformStep for F
where
    F: Fn() -> Result<StepOutput, StepError> + Send + Sync,
{
    fn run(&self) -> Result<StepOutput, StepError> {
        self()
    }
}
