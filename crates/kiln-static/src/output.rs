//! Writing step output.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use kiln_tasks::StepError;

/// Rendered files of one step, keyed by output path.
///
/// Nothing touches the output directory until [`Outputs::write`]; a step
/// that fails while rendering leaves the previous output in place.
#[derive(Debug, Default)]
pub struct Outputs {
    files: Vec<(PathBuf, String)>,
    sources: HashMap<PathBuf, String>,
}

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `contents` for `path`. Two sources may not share an output.
    pub fn add(&mut self, path: PathBuf, contents: String, source: &str) -> Result<(), String> {
        if let Some(previous) = self.sources.get(&path) {
            return Err(format!(
                "output {} is also produced by {}",
                path.display(),
                previous
            ));
        }
        self.sources.insert(path.clone(), source.to_string());
        self.files.push((path, contents));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write every queued file, creating parent directories.
    pub fn write(self) -> Result<Vec<PathBuf>, StepError> {
        let mut written = Vec::with_capacity(self.files.len());
        for (path, contents) in self.files {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, contents)?;
            written.push(path);
        }
        Ok(written)
    }
}
