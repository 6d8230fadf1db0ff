//! Build configuration shared by every step.

use std::path::{Path, PathBuf};

use lightningcss::targets::{Browsers, Targets};

/// Whether output is tuned for local iteration or for deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

/// Configuration for building a site.
///
/// Loaded once at startup and shared by reference with every step.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Project root; source directories live directly beneath it
    pub source_root: PathBuf,

    /// Output directory
    pub output_dir: PathBuf,

    /// Site title exposed to templates as `site.title`
    pub title: String,

    /// Base URL for links to generated assets
    pub base_url: String,

    /// Stylesheet entry globs, relative to the source root
    pub style_entries: Vec<String>,

    /// Script entry globs, relative to the source root
    pub script_entries: Vec<String>,

    /// Static asset globs, relative to the source root
    pub assets: Vec<String>,

    /// Browser targets, e.g. `["chrome 100", "safari 15.4"]`
    pub targets: Vec<String>,

    /// Preview server port
    pub port: u16,

    pub mode: BuildMode,

    /// URL of the live-reload client injected into HTML output
    pub reload_script: Option<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("."),
            output_dir: PathBuf::from("dist"),
            title: "Site".to_string(),
            base_url: "/".to_string(),
            style_entries: vec!["styles/*.css".to_string()],
            script_entries: vec!["scripts/*.js".to_string()],
            assets: vec!["assets/**/*".to_string()],
            targets: Vec::new(),
            port: 3000,
            mode: BuildMode::Development,
            reload_script: None,
        }
    }
}

/// An unrecognised entry in `targets`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid browser target '{0}' (expected e.g. \"chrome 100\")")]
pub struct TargetError(pub String);

impl BuildConfig {
    pub fn is_production(&self) -> bool {
        self.mode == BuildMode::Production
    }

    /// Resolve a directory beneath the source root.
    pub fn source_dir(&self, name: &str) -> PathBuf {
        self.source_root.join(name)
    }

    /// Path of `path` relative to the source root, forward-slashed.
    pub fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.source_root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// URL of an output-relative asset path.
    pub fn asset_url(&self, rel: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), rel)
    }

    /// lightningcss targets for the configured browser list.
    pub fn css_targets(&self) -> Result<Targets, TargetError> {
        if self.targets.is_empty() {
            return Ok(Targets::default());
        }

        let mut browsers = Browsers::default();
        for target in &self.targets {
            let mut parts = target.split_whitespace();
            let (Some(name), Some(version), None) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(TargetError(target.clone()));
            };
            let version = parse_version(version).ok_or_else(|| TargetError(target.clone()))?;

            let slot = match name.to_ascii_lowercase().as_str() {
                "android" => &mut browsers.android,
                "chrome" => &mut browsers.chrome,
                "edge" => &mut browsers.edge,
                "firefox" | "ff" => &mut browsers.firefox,
                "ie" => &mut browsers.ie,
                "ios" | "ios_saf" => &mut browsers.ios_saf,
                "opera" => &mut browsers.opera,
                "safari" => &mut browsers.safari,
                "samsung" => &mut browsers.samsung,
                _ => return Err(TargetError(target.clone())),
            };
            // keep the oldest version when a browser is listed twice
            *slot = Some(slot.map_or(version, |v| v.min(version)));
        }

        Ok(Targets::from(browsers))
    }
}

/// `major[.minor[.patch]]` packed the way lightningcss expects.
fn parse_version(version: &str) -> Option<u32> {
    let mut parts = version.split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    let patch: u32 = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    if parts.next().is_some() || major > 255 || minor > 255 || patch > 255 {
        return None;
    }
    Some((major << 16) | (minor << 8) | patch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_browser_targets() {
        let config = BuildConfig {
            targets: vec!["chrome 95".into(), "safari 15.4".into(), "chrome 100".into()],
            ..Default::default()
        };

        let targets = config.css_targets().unwrap();
        let browsers = targets.browsers.unwrap();

        assert_eq!(browsers.chrome, Some(95 << 16));
        assert_eq!(browsers.safari, Some((15 << 16) | (4 << 8)));
        assert_eq!(browsers.firefox, None);
    }

    #[test]
    fn rejects_malformed_targets() {
        for bad in ["chrome", "netscape 4", "chrome x", "chrome 1 2"] {
            let config = BuildConfig {
                targets: vec![bad.into()],
                ..Default::default()
            };
            assert_eq!(config.css_targets().unwrap_err(), TargetError(bad.into()));
        }
    }

    #[test]
    fn builds_asset_urls() {
        let mut config = BuildConfig::default();
        assert_eq!(config.asset_url("assets/main.css"), "/assets/main.css");

        config.base_url = "/docs/".into();
        assert_eq!(config.asset_url("assets/main.css"), "/docs/assets/main.css");
    }
}
