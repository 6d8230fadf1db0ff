//! Task orchestration and incremental rebuilds for kiln.
//!
//! Transform steps are composed into a [`TaskGraph`] of series and parallel
//! groups and run by the [`Executor`]. In watch mode a [`ChangeRouter`] maps
//! changed files to watch bindings and the [`RebuildScheduler`] reruns them
//! without overlap, signalling a [`ReloadSink`] after each successful run.

pub mod executor;
pub mod graph;
pub mod router;
pub mod scheduler;
pub mod step;

pub use executor::{Executor, RunReport, StepExecutionError};
pub use graph::{GraphBuilder, GraphError, Node, Plan, RunError, TaskGraph, TaskNode};
pub use router::{BindingId, BindingSpec, ChangeRouter, ReloadScope, RouterError, WatchBinding};
pub use scheduler::{RebuildScheduler, RebuildStats, Reload, ReloadSink};
pub use step::{StepError, StepOutput, TransformStep};
