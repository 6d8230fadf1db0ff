//! Style guide generation.

use std::fs;
use std::sync::Arc;

use kiln_styleguide::{parse_document, render_html, slugify, StyleguideDoc};
use kiln_tasks::{StepError, StepOutput, TransformStep};

use crate::config::BuildConfig;
use crate::discover::{files_with_extension, relative_slashed};
use crate::snippet::inject_reload_script;
use crate::styles::StylesStep;
use crate::templates::{render_styleguide, Section, StyleguidePage, STYLEGUIDE_TEMPLATE_NAME};

/// Renders `styleguide/**/*.md` into `styleguide/index.html`.
pub struct StyleguideStep {
    config: Arc<BuildConfig>,
}

impl StyleguideStep {
    pub fn new(config: Arc<BuildConfig>) -> Self {
        Self { config }
    }

    fn sections(&self) -> Result<Vec<Section>, StepError> {
        let dir = self.config.source_dir("styleguide");
        let mut entries: Vec<(i32, String, StyleguideDoc)> = Vec::new();

        for path in files_with_extension(&dir, &["md", "markdown"]) {
            let rel = relative_slashed(&self.config.source_root, &path);
            let source = fs::read_to_string(&path)?;
            let doc = parse_document(&source)
                .map_err(|e| StepError::Render(format!("{}: {}", rel, e)))?;

            if doc.frontmatter.as_ref().is_some_and(|f| f.hidden) {
                continue;
            }
            let order = doc.frontmatter.as_ref().and_then(|f| f.order).unwrap_or(999);
            let key = relative_slashed(&dir, &path.with_extension(""));
            entries.push((order, key, doc));
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        Ok(entries
            .into_iter()
            .map(|(_, key, doc)| {
                let frontmatter = doc.frontmatter.as_ref();
                Section {
                    title: doc.title_or(key.rsplit('/').next().unwrap_or(&key)),
                    id: format!("sg-{}", slugify(&key.replace('/', " "))),
                    category: frontmatter.and_then(|f| f.category.clone()),
                    description: frontmatter.and_then(|f| f.description.clone()),
                    html: render_html(&doc),
                }
            })
            .collect())
    }
}

impl TransformStep for StyleguideStep {
    fn run(&self) -> Result<StepOutput, StepError> {
        let sections = self.sections()?;
        if sections.is_empty() {
            tracing::debug!("No style guide entries, skipping");
            return Ok(StepOutput::empty());
        }

        let styles = StylesStep::new(Arc::clone(&self.config))
            .entries()?
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .map(|name| self.config.asset_url(&format!("assets/{}", name)))
            .collect();

        let custom = self.config.source_root.join(STYLEGUIDE_TEMPLATE_NAME);
        let template = if custom.is_file() {
            Some(fs::read_to_string(&custom)?)
        } else {
            None
        };

        let page = StyleguidePage {
            site_title: self.config.title.clone(),
            base_url: self.config.base_url.clone(),
            styles,
            nav: StyleguidePage::build_nav(&sections),
            sections,
        };

        let html = render_styleguide(template, &page)
            .map_err(|e| StepError::Render(format!("style guide: {}", e)))?;
        let html = match &self.config.reload_script {
            Some(src) => inject_reload_script(&html, src),
            None => html,
        };

        let output = self.config.output_dir.join("styleguide/index.html");
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&output, html)?;

        tracing::debug!("Rendered style guide with {} sections", page.sections.len());
        Ok(StepOutput::with_files(vec![output]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn config(root: &Path) -> Arc<BuildConfig> {
        Arc::new(BuildConfig {
            source_root: root.to_path_buf(),
            output_dir: root.join("dist"),
            title: "Kiln".into(),
            ..Default::default()
        })
    }

    #[test]
    fn renders_entries_in_order_with_live_examples() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(root, "styles/main.css", "body {}");
        write(
            root,
            "styleguide/buttons.md",
            "---\ntitle: Buttons\norder: 2\ncategory: Components\n---\n\n```html example\n<button class=\"btn\">Go</button>\n```\n",
        );
        write(root, "styleguide/colours.md", "---\ntitle: Colours\norder: 1\n---\n\nPalette.\n");
        write(root, "styleguide/wip.md", "---\ntitle: WIP\nhidden: true\n---\n");

        let output = StyleguideStep::new(config(root)).run().unwrap();
        assert_eq!(output.written, vec![root.join("dist/styleguide/index.html")]);

        let html = fs::read_to_string(root.join("dist/styleguide/index.html")).unwrap();
        let colours = html.find("id=\"sg-colours\"").unwrap();
        let buttons = html.find("id=\"sg-buttons\"").unwrap();
        assert!(colours < buttons);
        assert!(html.contains("<div class=\"sg-preview\">\n<button class=\"btn\">Go</button>"));
        assert!(html.contains("main.css"));
        assert!(!html.contains("WIP"));
    }

    #[test]
    fn skips_when_there_are_no_entries() {
        let temp = tempdir().unwrap();
        let output = StyleguideStep::new(config(temp.path())).run().unwrap();

        assert!(output.written.is_empty());
        assert!(!temp.path().join("dist/styleguide").exists());
    }

    #[test]
    fn uses_project_template_when_present() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(root, "styleguide/grid.md", "# Grid\n");
        write(
            root,
            "layouts/styleguide.html",
            "<body>{% for s in sections %}<h2>{{ s.title }}</h2>{% endfor %}</body>",
        );

        StyleguideStep::new(config(root)).run().unwrap();

        let html = fs::read_to_string(root.join("dist/styleguide/index.html")).unwrap();
        assert_eq!(html, "<body><h2>Grid</h2></body>");
    }
}
