//! Static file steps: clean and copy.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_tasks::{StepError, StepOutput, TransformStep};

use crate::config::BuildConfig;
use crate::discover::glob_files;

/// Empties the output directory, creating it if needed.
pub struct CleanStep {
    config: Arc<BuildConfig>,
}

impl CleanStep {
    pub fn new(config: Arc<BuildConfig>) -> Self {
        Self { config }
    }
}

impl TransformStep for CleanStep {
    fn run(&self) -> Result<StepOutput, StepError> {
        let output = &self.config.output_dir;

        let root = self
            .config
            .source_root
            .canonicalize()
            .unwrap_or_else(|_| self.config.source_root.clone());
        if let Ok(out) = output.canonicalize() {
            if root.starts_with(&out) {
                return Err(StepError::Io(format!(
                    "refusing to clean {}: it contains the source root",
                    output.display()
                )));
            }
        }

        fs::create_dir_all(output)?;
        for entry in fs::read_dir(output)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }

        tracing::debug!("Cleaned {}", output.display());
        Ok(StepOutput::empty())
    }
}

/// Copies files matching the asset globs into the output directory.
///
/// Files under `assets/` keep their path relative to it; anything else keeps
/// its path relative to the source root.
pub struct CopyStep {
    config: Arc<BuildConfig>,
}

impl CopyStep {
    pub fn new(config: Arc<BuildConfig>) -> Self {
        Self { config }
    }

    fn destination(&self, source: &Path) -> PathBuf {
        let assets = self.config.source_dir("assets");
        let rel = source
            .strip_prefix(&assets)
            .or_else(|_| source.strip_prefix(&self.config.source_root))
            .unwrap_or(source);
        self.config.output_dir.join(rel)
    }
}

impl TransformStep for CopyStep {
    fn run(&self) -> Result<StepOutput, StepError> {
        let files = glob_files(
            &self.config.source_root,
            &self.config.assets,
            &self.config.output_dir,
        )?;

        let mut written = Vec::with_capacity(files.len());
        for source in files {
            let dest = self.destination(&source);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&source, &dest)?;
            written.push(dest);
        }

        tracing::debug!("Copied {} assets", written.len());
        Ok(StepOutput::with_files(written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config(root: &Path) -> Arc<BuildConfig> {
        Arc::new(BuildConfig {
            source_root: root.to_path_buf(),
            output_dir: root.join("dist"),
            assets: vec!["assets/**/*".into(), "robots.txt".into()],
            ..Default::default()
        })
    }

    #[test]
    fn clean_empties_output_dir() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("dist/old/nested")).unwrap();
        fs::write(root.join("dist/stale.html"), "x").unwrap();

        CleanStep::new(config(root)).run().unwrap();

        assert!(root.join("dist").is_dir());
        assert_eq!(fs::read_dir(root.join("dist")).unwrap().count(), 0);
    }

    #[test]
    fn clean_refuses_to_delete_sources() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let step = CleanStep::new(Arc::new(BuildConfig {
            source_root: root.join("site"),
            output_dir: root.to_path_buf(),
            ..Default::default()
        }));
        fs::create_dir_all(root.join("site")).unwrap();

        assert!(matches!(step.run(), Err(StepError::Io(_))));
        assert!(root.join("site").exists());
    }

    #[test]
    fn copies_assets_preserving_paths() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("assets/img")).unwrap();
        fs::write(root.join("assets/img/logo.svg"), "<svg/>").unwrap();
        fs::write(root.join("assets/favicon.ico"), "ico").unwrap();
        fs::write(root.join("robots.txt"), "User-agent: *").unwrap();

        let output = CopyStep::new(config(root)).run().unwrap();

        assert_eq!(output.written.len(), 3);
        assert_eq!(fs::read_to_string(root.join("dist/img/logo.svg")).unwrap(), "<svg/>");
        assert!(root.join("dist/favicon.ico").exists());
        assert!(root.join("dist/robots.txt").exists());
    }

    #[test]
    fn repeated_copy_skips_output_dir() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("assets")).unwrap();
        fs::write(root.join("assets/logo.png"), "png").unwrap();
        let step = CopyStep::new(Arc::new(BuildConfig {
            source_root: root.to_path_buf(),
            output_dir: root.join("dist"),
            assets: vec!["**/*.png".into()],
            ..Default::default()
        }));

        step.run().unwrap();
        let output = step.run().unwrap();

        assert_eq!(output.written, vec![root.join("dist/logo.png")]);
        assert!(!root.join("dist/dist").exists());
    }
}
