//! Loading `kiln.toml`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use kiln_static::{BuildConfig, BuildMode, TargetError};
use serde::Deserialize;

/// Configuration file structure (kiln.toml).
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    site: SiteConfig,
    #[serde(default)]
    build: BuildSettings,
    #[serde(default)]
    server: ServerSettings,
}

#[derive(Debug, Deserialize)]
struct SiteConfig {
    #[serde(default = "default_title")]
    title: String,
    #[serde(default = "default_base_url")]
    base_url: String,
    /// Source root, relative to the config file
    #[serde(default = "default_source")]
    source: String,
    #[serde(default = "default_output")]
    output: String,
}

#[derive(Debug, Deserialize)]
struct BuildSettings {
    #[serde(default = "default_styles")]
    styles: Vec<String>,
    #[serde(default = "default_scripts")]
    scripts: Vec<String>,
    #[serde(default = "default_assets")]
    assets: Vec<String>,
    /// Browser targets such as "chrome 95"
    #[serde(default)]
    targets: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ServerSettings {
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            base_url: default_base_url(),
            source: default_source(),
            output: default_output(),
        }
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            styles: default_styles(),
            scripts: default_scripts(),
            assets: default_assets(),
            targets: Vec::new(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

fn default_title() -> String {
    "My Site".to_string()
}
fn default_base_url() -> String {
    "/".to_string()
}
fn default_source() -> String {
    ".".to_string()
}
fn default_output() -> String {
    "dist".to_string()
}
fn default_styles() -> Vec<String> {
    vec!["styles/*.css".to_string()]
}
fn default_scripts() -> Vec<String> {
    vec!["scripts/*.js".to_string()]
}
fn default_assets() -> Vec<String> {
    vec!["assets/**/*".to_string()]
}
fn default_port() -> u16 {
    3000
}

/// Errors loading the configuration file. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Config file {0} not found (run 'kiln init' to create one)")]
    Missing(PathBuf),

    #[error("Failed to read {0}: {1}")]
    Read(PathBuf, #[source] io::Error),

    #[error("Failed to parse {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("{0}: {1}")]
    Targets(PathBuf, #[source] TargetError),
}

/// Read `path` and turn it into a [`BuildConfig`].
///
/// Source and output paths are resolved against the directory holding the
/// config file, so the result does not depend on the working directory.
pub fn load(path: &Path, mode: BuildMode) -> Result<BuildConfig, ConfigLoadError> {
    if !path.is_file() {
        return Err(ConfigLoadError::Missing(path.to_path_buf()));
    }
    let content =
        fs::read_to_string(path).map_err(|e| ConfigLoadError::Read(path.to_path_buf(), e))?;
    let file: ConfigFile =
        toml::from_str(&content).map_err(|e| ConfigLoadError::Parse(path.to_path_buf(), e))?;

    let base = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    // watcher events carry absolute paths
    let base = base
        .canonicalize()
        .map_err(|e| ConfigLoadError::Read(path.to_path_buf(), e))?;
    let source_root = base.join(&file.site.source);

    let config = BuildConfig {
        output_dir: base.join(&file.site.output),
        source_root,
        title: file.site.title,
        base_url: file.site.base_url,
        style_entries: file.build.styles,
        script_entries: file.build.scripts,
        assets: file.build.assets,
        targets: file.build.targets,
        port: file.server.port,
        mode,
        reload_script: None,
    };

    config
        .css_targets()
        .map_err(|e| ConfigLoadError::Targets(path.to_path_buf(), e))?;

    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}
