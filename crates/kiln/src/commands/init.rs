//! Scaffold a new site.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command.
///
/// Files are created next to `config_path`. Existing files are left alone
/// unless `yes` is set.
pub fn run(config_path: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing kiln...");

    let root = match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let files = [
        (config_path.to_path_buf(), DEFAULT_CONFIG),
        (root.join("layouts/default.html"), DEFAULT_LAYOUT),
        (root.join("partials/nav.html"), DEFAULT_NAV),
        (root.join("pages/index.html"), DEFAULT_INDEX),
        (root.join("styles/main.css"), DEFAULT_STYLES),
        (root.join("styles/_tokens.css"), DEFAULT_TOKENS),
        (root.join("scripts/main.js"), DEFAULT_SCRIPT),
        (root.join("data/site.yaml"), DEFAULT_DATA),
        (root.join("styleguide/buttons.md"), DEFAULT_STYLEGUIDE),
    ];

    let mut created = 0;
    for (path, contents) in files {
        if path.exists() && !yes {
            tracing::warn!("{} already exists. Use --yes to overwrite.", path.display());
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Created {}", path.display());
        created += 1;
    }

    let assets = root.join("assets");
    fs::create_dir_all(&assets).context("Failed to create assets directory")?;

    tracing::info!("Initialization complete! ({} files written)", created);
    tracing::info!("Run 'kiln dev' to start the development server.");

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Kiln Configuration

[site]
# Site title, available to templates as site.title
title = "My Site"

# Base URL (for deployment)
base_url = "/"

# Source and output directories, relative to this file
source = "."
output = "dist"

[build]
# Entry stylesheets and scripts; files starting with _ are never entries
styles = ["styles/*.css"]
scripts = ["scripts/*.js"]

# Copied verbatim into the output
assets = ["assets/**/*"]

# Browser targets for CSS prefixing
targets = ["chrome 95", "firefox 90", "safari 14"]

[server]
port = 3000
"#;

const DEFAULT_LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{ page.title }} - {{ site.title }}</title>
  <link rel="stylesheet" href="/assets/main.css">
</head>
<body>
  {% include "partials/nav.html" %}
  <main>
    {{ content }}
  </main>
  <script src="/assets/main.js"></script>
</body>
</html>
"#;

const DEFAULT_NAV: &str = r#"<nav>
  <a href="/">{{ site.title }}</a>
  <a href="/styleguide/">Style guide</a>
</nav>
"#;

const DEFAULT_INDEX: &str = r#"---
title: Home
---
<h1>{{ data.site.tagline }}</h1>

<p>Edit <code>pages/index.html</code> and save to see it reload.</p>
"#;

const DEFAULT_TOKENS: &str = r#":root {
  --brand: #b5452b;
  --text: #222;
}
"#;

const DEFAULT_STYLES: &str = r#"@import "_tokens.css";

body {
  font-family: system-ui, sans-serif;
  color: var(--text);
}

.btn {
  background: var(--brand);
  color: white;
  border: 0;
  padding: 0.5rem 1rem;
  user-select: none;
}
"#;

const DEFAULT_SCRIPT: &str = r#"document.addEventListener('DOMContentLoaded', () => {
  console.log('Hello from kiln');
});
"#;

const DEFAULT_DATA: &str = r#"tagline: Welcome to your new site
"#;

const DEFAULT_STYLEGUIDE: &str = r#"---
title: Buttons
category: Components
order: 1
---

Primary actions use the `.btn` class.

```html example
<button class="btn">Save</button>
```
"#;
