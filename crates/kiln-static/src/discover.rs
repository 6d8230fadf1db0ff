//! Source file discovery.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use globset::GlobBuilder;
use kiln_tasks::StepError;
use walkdir::WalkDir;

/// Files under `root` matching any of `patterns`, sorted.
///
/// Only the literal directory prefix of each pattern is walked, so a glob
/// like `styles/*.css` never descends into unrelated trees. Nothing under
/// `output_dir` is ever returned, even for patterns like `**/*.png`.
pub fn glob_files(
    root: &Path,
    patterns: &[String],
    output_dir: &Path,
) -> Result<Vec<PathBuf>, StepError> {
    let mut found = BTreeSet::new();
    let output_rel = output_dir.strip_prefix(root).unwrap_or(output_dir);

    for pattern in patterns {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| StepError::Io(format!("invalid glob '{}': {}", pattern, e)))?
            .compile_matcher();

        let base = root.join(literal_prefix(pattern));
        let walker = WalkDir::new(&base)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| {
                let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
                output_rel.as_os_str().is_empty() || !rel.starts_with(output_rel)
            });
        let files = walker
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path());

        for path in files {
            let rel = relative_slashed(root, &path);
            if matcher.is_match(&rel) {
                found.insert(path);
            }
        }
    }

    Ok(found.into_iter().collect())
}

/// Files under `dir` with one of `extensions`, sorted. A missing directory
/// yields nothing.
pub fn files_with_extension(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walk_files(dir)
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| extensions.contains(&ext))
        })
        .collect();
    files.sort();
    files
}

/// `path` relative to `root` with forward slashes.
pub fn relative_slashed(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn walk_files(dir: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
}

fn literal_prefix(pattern: &str) -> PathBuf {
    let mut prefix = PathBuf::new();
    let mut segments = pattern.split('/').peekable();
    while let Some(segment) = segments.next() {
        // the last segment names files, not a directory
        if segments.peek().is_none() || segment.contains(['*', '?', '[', '{']) {
            break;
        }
        prefix.push(segment);
    }
    prefix
}
