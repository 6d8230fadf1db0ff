//! Stylesheet bundling with lightningcss.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_tasks::{StepError, StepOutput, TransformStep};
use lightningcss::bundler::{Bundler, FileProvider};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions};
use lightningcss::targets::Targets;

use crate::config::BuildConfig;
use crate::discover::glob_files;
use crate::output::Outputs;

/// Bundles each entry stylesheet into `assets/<name>.css`.
///
/// Entries whose file name starts with `_` are treated as partials and
/// skipped; they are only reachable through `@import`.
pub struct StylesStep {
    config: Arc<BuildConfig>,
}

impl StylesStep {
    pub fn new(config: Arc<BuildConfig>) -> Self {
        Self { config }
    }

    /// Entry stylesheets, partials excluded.
    pub fn entries(&self) -> Result<Vec<PathBuf>, StepError> {
        let files = glob_files(
            &self.config.source_root,
            &self.config.style_entries,
            &self.config.output_dir,
        )?;
        Ok(files.into_iter().filter(|p| !is_partial(p)).collect())
    }
}

impl TransformStep for StylesStep {
    fn run(&self) -> Result<StepOutput, StepError> {
        let targets = self
            .config
            .css_targets()
            .map_err(|e| StepError::Transform(e.to_string()))?;
        let minify = self.config.is_production();
        let out_dir = self.config.output_dir.join("assets");

        let mut outputs = Outputs::new();
        for entry in self.entries()? {
            let display = self.config.display_path(&entry);
            let transform_err =
                |message: String| StepError::Transform(format!("{}: {}", display, message));

            let css = bundle(&entry, targets, minify).map_err(transform_err)?;
            let name = entry
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("style.css");
            outputs
                .add(out_dir.join(name), css, &display)
                .map_err(transform_err)?;
        }
        let written = outputs.write()?;

        tracing::debug!("Compiled {} stylesheets", written.len());
        Ok(StepOutput::with_files(written))
    }
}

/// Inline `@import`s, lower for `targets`, and print.
fn bundle(entry: &Path, targets: Targets, minify: bool) -> Result<String, String> {
    let provider = FileProvider::new();
    let mut bundler = Bundler::new(&provider, None, ParserOptions::default());
    let mut stylesheet = bundler.bundle(entry).map_err(|e| e.to_string())?;

    stylesheet
        .minify(MinifyOptions {
            targets,
            ..Default::default()
        })
        .map_err(|e| e.to_string())?;

    let result = stylesheet
        .to_css(PrinterOptions {
            minify,
            targets,
            ..Default::default()
        })
        .map_err(|e| e.to_string())?;

    Ok(result.code)
}

fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}
