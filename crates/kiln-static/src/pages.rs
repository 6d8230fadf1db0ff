//! Page rendering.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use kiln_styleguide::split_frontmatter;
use kiln_tasks::{StepError, StepOutput, TransformStep};
use minijinja::{context, Value};
use rayon::prelude::*;
use serde::Deserialize;
use serde_json::Map;

use crate::cache::{Loaded, RenderCache};
use crate::config::BuildConfig;
use crate::discover::{files_with_extension, relative_slashed};
use crate::output::Outputs;
use crate::snippet::inject_reload_script;

const DEFAULT_LAYOUT: &str = "default";

/// Page frontmatter. Unknown keys are exposed to templates under `page`.
#[derive(Debug, Default, Deserialize)]
struct PageMeta {
    title: Option<String>,
    layout: Option<String>,
    #[serde(flatten)]
    extra: Map<String, serde_json::Value>,
}

/// Renders `pages/**/*.html` through the shared [`RenderCache`].
pub struct PagesStep {
    config: Arc<BuildConfig>,
    cache: Arc<RenderCache>,
}

impl PagesStep {
    pub fn new(config: Arc<BuildConfig>, cache: Arc<RenderCache>) -> Self {
        Self { config, cache }
    }

    fn render_page(&self, loaded: &Loaded, path: &Path) -> Result<(PathBuf, String), StepError> {
        let pages_dir = self.config.source_dir("pages");
        let rel = path.strip_prefix(&pages_dir).unwrap_or(path);
        let name = relative_slashed(&self.config.source_root, path);
        let render_err = |e: &dyn std::fmt::Display| StepError::Render(format!("{}: {}", name, e));

        let source = fs::read_to_string(path)?;
        let (yaml, body) = split_frontmatter(&source).map_err(|e| render_err(&e))?;
        let meta: PageMeta = match yaml {
            Some(yaml) if !yaml.trim().is_empty() => {
                serde_yaml::from_str(yaml).map_err(|e| render_err(&e))?
            }
            _ => PageMeta::default(),
        };

        let url = page_url(&self.config.base_url, rel);
        let title = meta
            .title
            .clone()
            .unwrap_or_else(|| title_from_path(rel));

        let mut page = meta.extra.clone();
        page.insert("title".into(), title.into());
        page.insert("url".into(), url.into());
        page.insert("path".into(), name.clone().into());

        let site = context! {
            title => &self.config.title,
            base_url => &self.config.base_url,
        };

        let content = loaded
            .env
            .render_named_str(
                &name,
                body,
                context! { site => &site, data => &loaded.data, page => &page },
            )
            .map_err(|e| render_err(&e))?;

        let html = match self.layout_name(loaded, &meta)? {
            Some(layout) => loaded
                .env
                .get_template(&layout)
                .and_then(|tmpl| {
                    tmpl.render(context! {
                        site => &site,
                        data => &loaded.data,
                        page => &page,
                        content => Value::from_safe_string(content),
                    })
                })
                .map_err(|e| render_err(&e))?,
            None => content,
        };

        let html = match &self.config.reload_script {
            Some(src) => inject_reload_script(&html, src),
            None => html,
        };

        Ok((self.config.output_dir.join(page_output_path(rel)), html))
    }

    /// Explicit layouts must exist; the default one is optional and
    /// `layout: none` opts out.
    fn layout_name(&self, loaded: &Loaded, meta: &PageMeta) -> Result<Option<String>, StepError> {
        match meta.layout.as_deref() {
            Some("none") => Ok(None),
            Some(layout) => {
                let name = layout_template(layout);
                loaded
                    .env
                    .get_template(&name)
                    .map_err(|_| StepError::Render(format!("unknown layout '{}'", layout)))?;
                Ok(Some(name))
            }
            None => {
                let name = layout_template(DEFAULT_LAYOUT);
                Ok(loaded.env.get_template(&name).is_ok().then_some(name))
            }
        }
    }
}

impl TransformStep for PagesStep {
    fn run(&self) -> Result<StepOutput, StepError> {
        let start = Instant::now();
        let loaded = self.cache.get_or_load()?;
        let sources = files_with_extension(&self.config.source_dir("pages"), &["html"]);

        let rendered = sources
            .par_iter()
            .map(|path| self.render_page(&loaded, path).map(|page| (path, page)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut outputs = Outputs::new();
        for (path, (output, html)) in rendered {
            let name = self.config.display_path(path);
            outputs
                .add(output, html, &name)
                .map_err(|e| StepError::Render(format!("{}: {}", name, e)))?;
        }
        let written = outputs.write()?;

        tracing::debug!(
            "Rendered {} pages in {}ms",
            written.len(),
            start.elapsed().as_millis()
        );

        Ok(StepOutput::with_files(written))
    }
}

fn layout_template(layout: &str) -> String {
    if layout.ends_with(".html") {
        format!("layouts/{}", layout)
    } else {
        format!("layouts/{}.html", layout)
    }
}

/// `about.html` -> `about/index.html`; `index.html` stays put.
fn page_output_path(rel: &Path) -> PathBuf {
    let parent = rel.parent().unwrap_or(Path::new(""));
    let stem = rel.file_stem().and_then(|s| s.to_str()).unwrap_or("index");

    if stem == "index" {
        parent.join("index.html")
    } else {
        parent.join(stem).join("index.html")
    }
}

fn page_url(base_url: &str, rel: &Path) -> String {
    let dir = page_output_path(rel)
        .parent()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();
    let base = base_url.trim_end_matches('/');

    if dir.is_empty() {
        format!("{}/", base)
    } else {
        format!("{}/{}/", base, dir)
    }
}

fn title_from_path(rel: &Path) -> String {
    let stem = match rel.file_stem().and_then(|s| s.to_str()) {
        Some("index") | None => rel
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .unwrap_or("Home"),
        Some(stem) => stem,
    };

    let mut chars = stem.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + &chars.as_str().replace('-', " "),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ClearCacheStep;
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn site() -> (TempDir, Arc<BuildConfig>) {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(
            root,
            "layouts/default.html",
            "<html><body>{% include \"partials/nav.html\" %}<main>{{ content }}</main></body></html>",
        );
        write(root, "partials/nav.html", "<nav>{{ site.title }}</nav>");
        write(root, "data/team.yaml", "lead: Grace\n");
        write(
            root,
            "pages/index.html",
            "---\ntitle: Welcome\n---\n<h1>{{ page.title }}</h1><p>{{ data.team.lead }}</p>",
        );
        write(
            root,
            "pages/docs/getting-started.html",
            "---\nlayout: none\nsection: guides\n---\n{{ page.title }}|{{ page.url|safe }}|{{ page.section }}",
        );

        let config = Arc::new(BuildConfig {
            source_root: root.to_path_buf(),
            output_dir: root.join("dist"),
            title: "Kiln Test".into(),
            ..Default::default()
        });
        (temp, config)
    }

    fn step(config: &Arc<BuildConfig>) -> (PagesStep, Arc<RenderCache>) {
        let cache = Arc::new(RenderCache::new(Arc::clone(config)));
        (PagesStep::new(Arc::clone(config), Arc::clone(&cache)), cache)
    }

    #[test]
    fn renders_pages_through_layouts() {
        let (_temp, config) = site();
        let (pages, _) = step(&config);

        let output = pages.run().unwrap();
        assert_eq!(output.written.len(), 2);

        let index = fs::read_to_string(config.output_dir.join("index.html")).unwrap();
        assert_eq!(
            index,
            "<html><body><nav>Kiln Test</nav><main><h1>Welcome</h1><p>Grace</p></main></body></html>"
        );

        let guide =
            fs::read_to_string(config.output_dir.join("docs/getting-started/index.html")).unwrap();
        assert_eq!(guide, "Getting started|/docs/getting-started/|guides");
    }

    #[test]
    fn injects_reload_client_when_configured() {
        let (_temp, config) = site();
        let config = Arc::new(BuildConfig {
            reload_script: Some("/__kiln/reload.js".into()),
            ..(*config).clone()
        });
        let (pages, _) = step(&config);
        pages.run().unwrap();

        let index = fs::read_to_string(config.output_dir.join("index.html")).unwrap();
        assert!(index.contains("<script src=\"/__kiln/reload.js\" defer></script>\n</body>"));
    }

    #[test]
    fn partial_change_shows_after_cache_clear() {
        let (temp, config) = site();
        let (pages, cache) = step(&config);
        pages.run().unwrap();

        write(temp.path(), "partials/nav.html", "<nav>updated</nav>");
        pages.run().unwrap();
        let stale = fs::read_to_string(config.output_dir.join("index.html")).unwrap();
        assert!(stale.contains("Kiln Test"));

        ClearCacheStep::new(cache).run().unwrap();
        pages.run().unwrap();
        let fresh = fs::read_to_string(config.output_dir.join("index.html")).unwrap();
        assert!(fresh.contains("<nav>updated</nav>"));
    }

    #[test]
    fn template_errors_are_render_errors() {
        let (temp, config) = site();
        write(temp.path(), "pages/broken.html", "{% if %}");
        let (pages, _) = step(&config);

        let err = pages.run().unwrap_err();
        assert!(matches!(err, StepError::Render(ref msg) if msg.contains("pages/broken.html")));
    }

    #[test]
    fn failed_render_keeps_previous_output() {
        let (temp, config) = site();
        write(temp.path(), "pages/a.html", "---\nlayout: none\n---\nold A");
        write(temp.path(), "pages/b.html", "---\nlayout: none\n---\nok B");
        let (pages, _) = step(&config);
        pages.run().unwrap();

        write(temp.path(), "pages/a.html", "---\nlayout: none\n---\nnew A");
        write(temp.path(), "pages/b.html", "{% if %}");
        assert!(pages.run().is_err());

        let a = fs::read_to_string(config.output_dir.join("a/index.html")).unwrap();
        assert_eq!(a, "old A");
        let b = fs::read_to_string(config.output_dir.join("b/index.html")).unwrap();
        assert_eq!(b, "ok B");
    }

    #[test]
    fn colliding_pages_are_rejected() {
        let (temp, config) = site();
        write(temp.path(), "pages/about.html", "one");
        write(temp.path(), "pages/about/index.html", "two");
        let (pages, _) = step(&config);

        let err = pages.run().unwrap_err();
        assert!(matches!(err, StepError::Render(ref msg) if msg.contains("also produced by")));
        assert!(!config.output_dir.join("about/index.html").exists());
    }

    #[test]
    fn unknown_layout_is_rejected() {
        let (temp, config) = site();
        write(temp.path(), "pages/odd.html", "---\nlayout: wide\n---\nbody");
        let (pages, _) = step(&config);

        assert_eq!(
            pages.run().unwrap_err(),
            StepError::Render("unknown layout 'wide'".into())
        );
    }

    #[test]
    fn computes_pretty_paths() {
        assert_eq!(page_output_path(Path::new("index.html")), PathBuf::from("index.html"));
        assert_eq!(
            page_output_path(Path::new("blog/post.html")),
            PathBuf::from("blog/post/index.html")
        );
        assert_eq!(page_url("/", Path::new("index.html")), "/");
        assert_eq!(page_url("/site/", Path::new("blog/index.html")), "/site/blog/");
        assert_eq!(title_from_path(Path::new("blog/index.html")), "Blog");
    }
}
