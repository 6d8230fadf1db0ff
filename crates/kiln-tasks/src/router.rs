//! Maps changed source paths to the task lists that must rerun.
//!
//! Bindings are evaluated top to bottom and every matching binding is
//! selected, so a layout change can select both the cache-clearing page
//! binding and anything else that watches layouts. A binding's optional
//! pre-action is folded into its plan as the first element of a series,
//! which is how cache invalidation is guaranteed to finish before the render
//! that depends on it starts.

use std::fmt;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::graph::{Node, TaskGraph};

/// How connected browsers should pick up a binding's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReloadScope {
    /// Navigate / refresh the page
    #[default]
    Full,

    /// Swap changed assets in place without navigation
    Stream,
}

/// Static description of one watch binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSpec {
    pub name: String,
    /// Globs relative to the project root
    pub watch: Vec<String>,
    pub exclude: Vec<String>,
    /// Tasks to run, in order
    pub tasks: Vec<String>,
    /// Task run before `tasks`, as part of the same series
    pub pre_action: Option<String>,
    pub reload: ReloadScope,
}

impl BindingSpec {
    pub fn new<W, T>(name: impl Into<String>, watch: W, tasks: T) -> Self
    where
        W: IntoIterator,
        W::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            name: name.into(),
            watch: watch.into_iter().map(Into::into).collect(),
            exclude: Vec::new(),
            tasks: tasks.into_iter().map(Into::into).collect(),
            pre_action: None,
            reload: ReloadScope::Full,
        }
    }

    pub fn exclude<E>(mut self, patterns: E) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
    {
        self.exclude = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn pre_action(mut self, task: impl Into<String>) -> Self {
        self.pre_action = Some(task.into());
        self
    }

    pub fn reload(mut self, scope: ReloadScope) -> Self {
        self.reload = scope;
        self
    }
}

/// Errors raised while compiling bindings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("binding '{binding}': invalid glob '{pattern}': {message}")]
    InvalidPattern {
        binding: String,
        pattern: String,
        message: String,
    },

    #[error("binding '{binding}' refers to unknown task '{task}'")]
    UnknownTask { binding: String, task: String },

    #[error("binding '{0}' has no tasks")]
    NoTasks(String),
}

/// Index of a binding in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub usize);

/// A compiled binding ready for matching.
pub struct WatchBinding {
    name: String,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
    plan: Node,
    reload: ReloadScope,
}

impl fmt::Debug for WatchBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchBinding")
            .field("name", &self.name)
            .field("reload", &self.reload)
            .finish_non_exhaustive()
    }
}

impl WatchBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The series this binding runs: pre-action first, then its tasks.
    pub fn plan(&self) -> &Node {
        &self.plan
    }

    pub fn reload(&self) -> ReloadScope {
        self.reload
    }

    /// Whether a root-relative, forward-slashed path belongs to this binding.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Ordered, multi-match table of watch bindings.
#[derive(Debug)]
pub struct ChangeRouter {
    root: PathBuf,
    ignored: Vec<PathBuf>,
    bindings: Vec<WatchBinding>,
}

impl ChangeRouter {
    /// Compile `specs` against `graph`.
    ///
    /// `root` is the directory globs are relative to. Every path under one of
    /// `ignored` (typically the output directory) never matches.
    pub fn new(
        root: impl Into<PathBuf>,
        ignored: &[PathBuf],
        specs: &[BindingSpec],
        graph: &TaskGraph,
    ) -> Result<Self, RouterError> {
        let root = root.into();
        let root = root.canonicalize().unwrap_or(root);

        let ignored = ignored
            .iter()
            .map(|p| relative_to(&root, p).unwrap_or_else(|| p.clone()))
            .collect();

        let bindings = specs
            .iter()
            .map(|spec| compile(spec, graph))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            root,
            ignored,
            bindings,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bindings(&self) -> &[WatchBinding] {
        &self.bindings
    }

    pub fn binding(&self, id: BindingId) -> &WatchBinding {
        &self.bindings[id.0]
    }

    pub fn find(&self, name: &str) -> Option<BindingId> {
        self.bindings
            .iter()
            .position(|b| b.name == name)
            .map(BindingId)
    }

    /// Select the bindings a batch of changed paths triggers.
    ///
    /// Each binding is returned at most once, in declaration order, no matter
    /// how many paths in the batch match it.
    pub fn route<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<BindingId> {
        let mut hit = vec![false; self.bindings.len()];

        for path in paths {
            let Some(rel) = relative_to(&self.root, path.as_ref()) else {
                tracing::debug!("ignoring path outside project: {}", path.as_ref().display());
                continue;
            };
            if self.ignored.iter().any(|ignored| rel.starts_with(ignored)) {
                continue;
            }

            let rel = rel.to_string_lossy().replace('\\', "/");
            for (index, binding) in self.bindings.iter().enumerate() {
                if binding.matches(&rel) {
                    tracing::debug!(binding = %binding.name, path = %rel, "watch match");
                    hit[index] = true;
                }
            }
        }

        hit.iter()
            .enumerate()
            .filter(|(_, matched)| **matched)
            .map(|(index, _)| BindingId(index))
            .collect()
    }
}

fn compile(spec: &BindingSpec, graph: &TaskGraph) -> Result<WatchBinding, RouterError> {
    if spec.tasks.is_empty() {
        return Err(RouterError::NoTasks(spec.name.clone()));
    }

    let watch_set = build_globset(&spec.name, &spec.watch)?;
    let exclude_set = if spec.exclude.is_empty() {
        None
    } else {
        Some(build_globset(&spec.name, &spec.exclude)?)
    };

    let mut steps = Vec::with_capacity(spec.tasks.len() + 1);
    for task in spec.pre_action.iter().chain(spec.tasks.iter()) {
        let node = graph.get(task).ok_or_else(|| RouterError::UnknownTask {
            binding: spec.name.clone(),
            task: task.clone(),
        })?;
        steps.push(node.clone());
    }

    Ok(WatchBinding {
        name: spec.name.clone(),
        watch_set,
        exclude_set,
        plan: Node::Series(steps),
        reload: spec.reload,
    })
}

fn build_globset(binding: &str, patterns: &[String]) -> Result<GlobSet, RouterError> {
    let invalid = |pattern: &str, message: String| RouterError::InvalidPattern {
        binding: binding.to_string(),
        pattern: pattern.to_string(),
        message,
    };

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| invalid(pattern, e.to_string()))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| invalid(&patterns.join(", "), e.to_string()))
}

/// Express `path` relative to `root`. Relative inputs are assumed to already be
/// relative to the root.
fn relative_to(root: &Path, path: &Path) -> Option<PathBuf> {
    if path.is_relative() {
        return Some(path.components().collect());
    }
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_path_buf());
    }
    // The watcher may report non-canonical paths (symlinked temp dirs).
    let canonical = path
        .parent()
        .and_then(|parent| parent.canonicalize().ok())
        .and_then(|parent| path.file_name().map(|name| parent.join(name)))?;
    canonical.strip_prefix(root).ok().map(Path::to_path_buf)
}
