//! Compiled templates and site data, shared by the page render step.

use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use kiln_tasks::{StepError, StepOutput, TransformStep};
use minijinja::Environment;
use serde_json::{Map, Value};

use crate::config::BuildConfig;
use crate::discover::{files_with_extension, relative_slashed};

/// Everything a page render needs besides the page itself.
pub struct Loaded {
    /// Layouts and partials, named by their path under the source root
    /// (`layouts/default.html`, `partials/nav.html`)
    pub env: Environment<'static>,

    /// `data/<name>.{json,yaml,yml}` keyed by file stem
    pub data: Value,
}

/// Lazily filled template cache.
///
/// The first render after a [`clear`](RenderCache::clear) reloads every
/// layout, partial and data file from disk.
pub struct RenderCache {
    config: Arc<BuildConfig>,
    state: RwLock<Option<Arc<Loaded>>>,
}

impl RenderCache {
    pub fn new(config: Arc<BuildConfig>) -> Self {
        Self {
            config,
            state: RwLock::new(None),
        }
    }

    /// Return the cached templates, loading them if the cache is empty.
    pub fn get_or_load(&self) -> Result<Arc<Loaded>, StepError> {
        if let Some(loaded) = self.read_state().as_ref() {
            return Ok(Arc::clone(loaded));
        }

        let loaded = Arc::new(load(&self.config)?);
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(state.get_or_insert(loaded)))
    }

    /// Drop every compiled template and data file.
    pub fn clear(&self) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.read_state().is_some()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, Option<Arc<Loaded>>> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// The `clear-template-cache` step.
pub struct ClearCacheStep {
    cache: Arc<RenderCache>,
}

impl ClearCacheStep {
    pub fn new(cache: Arc<RenderCache>) -> Self {
        Self { cache }
    }
}

impl TransformStep for ClearCacheStep {
    fn run(&self) -> Result<StepOutput, StepError> {
        self.cache.clear();
        tracing::debug!("template cache cleared");
        Ok(StepOutput::empty())
    }
}

fn load(config: &BuildConfig) -> Result<Loaded, StepError> {
    let mut env = Environment::new();
    let mut count = 0;

    for dir in ["layouts", "partials"] {
        for path in files_with_extension(&config.source_dir(dir), &["html", "jinja", "j2"]) {
            let name = relative_slashed(&config.source_root, &path);
            let source = fs::read_to_string(&path)?;
            env.add_template_owned(name.clone(), source)
                .map_err(|e| StepError::Render(format!("{}: {}", name, e)))?;
            count += 1;
        }
    }

    let data = load_data(&config.source_dir("data"))?;

    tracing::debug!(templates = count, "template cache loaded");

    Ok(Loaded { env, data })
}

fn load_data(dir: &Path) -> Result<Value, StepError> {
    let mut data = Map::new();

    let Ok(entries) = fs::read_dir(dir) else {
        return Ok(Value::Object(data));
    };
    let mut paths: Vec<_> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        let (Some(stem), Some(ext)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.extension().and_then(|e| e.to_str()),
        ) else {
            continue;
        };

        let source = match ext {
            "json" | "yaml" | "yml" => fs::read_to_string(&path)?,
            _ => continue,
        };
        let value: Value = if ext == "json" {
            serde_json::from_str(&source)
                .map_err(|e| StepError::Render(format!("{}: {}", path.display(), e)))?
        } else {
            serde_yaml::from_str(&source)
                .map_err(|e| StepError::Render(format!("{}: {}", path.display(), e)))?
        };
        data.insert(stem.to_string(), value);
    }

    Ok(Value::Object(data))
}
