//! Declarative composition of transform steps.
//!
//! A graph is built once at startup from named leaf tasks and named
//! aggregates. Aggregates describe their shape with [`Plan`], which may refer
//! to any task or aggregate registered before it; references are resolved at
//! [`GraphBuilder::build`] time so the resulting [`Node`] trees only ever
//! contain concrete [`TaskNode`]s.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::executor::{Executor, RunReport, StepExecutionError};
use crate::step::TransformStep;

/// A named leaf of the graph.
#[derive(Clone)]
pub struct TaskNode {
    name: Arc<str>,
    step: Arc<dyn TransformStep>,
}

impl TaskNode {
    /// Wrap a step under the given name.
    pub fn new(name: impl Into<Arc<str>>, step: Arc<dyn TransformStep>) -> Self {
        Self {
            name: name.into(),
            step,
        }
    }

    /// Task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the step implementation.
    pub fn step(&self) -> Arc<dyn TransformStep> {
        Arc::clone(&self.step)
    }
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A resolved, executable tree.
#[derive(Debug, Clone)]
pub enum Node {
    /// A single step
    Task(TaskNode),

    /// Children run one after another; a failure stops the series
    Series(Vec<Node>),

    /// Children start together; completes once all have finished
    Parallel(Vec<Node>),
}

impl Node {
    /// Names of every leaf task, in declaration order.
    pub fn task_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Node::Task(task) => out.push(task.name()),
            Node::Series(children) | Node::Parallel(children) => {
                for child in children {
                    child.collect_names(out);
                }
            }
        }
    }
}

/// An unresolved description of an aggregate task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Reference to a registered task or aggregate by name
    Task(String),
    Series(Vec<Plan>),
    Parallel(Vec<Plan>),
}

impl Plan {
    pub fn task(name: impl Into<String>) -> Self {
        Plan::Task(name.into())
    }

    pub fn series<I, P>(items: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Plan>,
    {
        Plan::Series(items.into_iter().map(Into::into).collect())
    }

    pub fn parallel<I, P>(items: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Plan>,
    {
        Plan::Parallel(items.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for Plan {
    fn from(name: &str) -> Self {
        Plan::Task(name.to_string())
    }
}

impl From<String> for Plan {
    fn from(name: String) -> Self {
        Plan::Task(name)
    }
}

/// Errors raised while assembling a graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("task '{0}' is defined more than once")]
    DuplicateTask(String),

    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("aggregate '{0}' contains an empty series or parallel group")]
    EmptyComposite(String),
}

/// Errors raised by [`TaskGraph::run`].
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error(transparent)]
    Step(#[from] StepExecutionError),
}

/// Builder collecting tasks and aggregates in declaration order.
#[derive(Default)]
pub struct GraphBuilder {
    entries: Vec<(String, Entry)>,
}

enum Entry {
    Leaf(Arc<dyn TransformStep>),
    Aggregate(Plan),
}

impl GraphBuilder {
    /// Register a leaf task.
    pub fn task(mut self, name: impl Into<String>, step: Arc<dyn TransformStep>) -> Self {
        self.entries.push((name.into(), Entry::Leaf(step)));
        self
    }

    /// Register a named composition of earlier tasks.
    pub fn aggregate(mut self, name: impl Into<String>, plan: Plan) -> Self {
        self.entries.push((name.into(), Entry::Aggregate(plan)));
        self
    }

    /// Resolve every aggregate and freeze the graph.
    pub fn build(self) -> Result<TaskGraph, GraphError> {
        let mut nodes: HashMap<String, Node> = HashMap::new();
        let mut order = Vec::with_capacity(self.entries.len());

        for (name, entry) in self.entries {
            if nodes.contains_key(&name) {
                return Err(GraphError::DuplicateTask(name));
            }

            let node = match entry {
                Entry::Leaf(step) => Node::Task(TaskNode::new(name.as_str(), step)),
                Entry::Aggregate(plan) => resolve(&name, &plan, &nodes)?,
            };

            tracing::debug!(task = %name, "registered task");
            order.push(name.clone());
            nodes.insert(name, node);
        }

        Ok(TaskGraph { nodes, order })
    }
}

fn resolve(owner: &str, plan: &Plan, known: &HashMap<String, Node>) -> Result<Node, GraphError> {
    match plan {
        Plan::Task(name) => known
            .get(name)
            .cloned()
            .ok_or_else(|| GraphError::UnknownTask(name.clone())),
        Plan::Series(items) | Plan::Parallel(items) => {
            if items.is_empty() {
                return Err(GraphError::EmptyComposite(owner.to_string()));
            }
            let children = items
                .iter()
                .map(|item| resolve(owner, item, known))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(match plan {
                Plan::Series(_) => Node::Series(children),
                _ => Node::Parallel(children),
            })
        }
    }
}

/// An immutable set of named, executable task trees.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    nodes: HashMap<String, Node>,
    order: Vec<String>,
}

impl TaskGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    /// Look up a task or aggregate.
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Registered names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Run a named task to completion.
    pub async fn run(&self, name: &str) -> Result<RunReport, RunError> {
        let node = self
            .get(name)
            .ok_or_else(|| RunError::UnknownTask(name.to_string()))?;
        Ok(Executor::new().execute(node).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{StepError, StepOutput};
    use pretty_assertions::assert_eq;

    fn noop() -> Arc<dyn TransformStep> {
        Arc::new(|| Ok::<_, StepError>(StepOutput::empty()))
    }

    #[test]
    fn resolves_nested_aggregates() {
        let graph = TaskGraph::builder()
            .task("clean", noop())
            .task("pages", noop())
            .task("scripts", noop())
            .task("styles", noop())
            .aggregate("compile", Plan::parallel(["pages", "scripts"]))
            .aggregate(
                "build",
                Plan::series([Plan::task("clean"), Plan::task("compile"), "styles".into()]),
            )
            .build()
            .unwrap();

        let build = graph.get("build").unwrap();
        assert_eq!(build.task_names(), vec!["clean", "pages", "scripts", "styles"]);
        assert!(matches!(build, Node::Series(children) if children.len() == 3));
        assert_eq!(
            graph.names().collect::<Vec<_>>(),
            vec!["clean", "pages", "scripts", "styles", "compile", "build"]
        );
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = TaskGraph::builder()
            .task("pages", noop())
            .task("pages", noop())
            .build()
            .unwrap_err();

        assert_eq!(err, GraphError::DuplicateTask("pages".into()));
    }

    #[test]
    fn rejects_forward_and_unknown_references() {
        let err = TaskGraph::builder()
            .aggregate("build", Plan::series(["pages"]))
            .task("pages", noop())
            .build()
            .unwrap_err();

        assert_eq!(err, GraphError::UnknownTask("pages".into()));
    }

    #[test]
    fn rejects_empty_groups() {
        let err = TaskGraph::builder()
            .task("pages", noop())
            .aggregate("build", Plan::series([Plan::task("pages"), Plan::Parallel(vec![])]))
            .build()
            .unwrap_err();

        assert_eq!(err, GraphError::EmptyComposite("build".into()));
    }

    #[tokio::test]
    async fn run_reports_unknown_task() {
        let graph = TaskGraph::builder().task("pages", noop()).build().unwrap();

        let err = graph.run("deploy").await.unwrap_err();
        assert!(matches!(err, RunError::UnknownTask(name) if name == "deploy"));
    }
}
