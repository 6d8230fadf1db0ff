//! Built-in template for the generated style guide.

use minijinja::{context, Environment};

/// A section of the style guide, one per markdown entry.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Section {
    pub title: String,
    /// Anchor ID
    pub id: String,
    pub category: Option<String>,
    pub description: Option<String>,
    /// Rendered body HTML
    pub html: String,
}

/// A navigation group.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NavGroup {
    /// Category name; `None` for uncategorised entries
    pub title: Option<String>,
    pub items: Vec<NavItem>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct NavItem {
    pub title: String,
    pub id: String,
}

/// Context for rendering the style guide page.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StyleguidePage {
    pub site_title: String,
    pub base_url: String,
    /// URLs of the compiled stylesheets
    pub styles: Vec<String>,
    pub nav: Vec<NavGroup>,
    pub sections: Vec<Section>,
}

impl StyleguidePage {
    /// Group sections by category, keeping first-seen order.
    pub fn build_nav(sections: &[Section]) -> Vec<NavGroup> {
        let mut groups: Vec<NavGroup> = Vec::new();
        for section in sections {
            let item = NavItem {
                title: section.title.clone(),
                id: section.id.clone(),
            };
            match groups.iter_mut().find(|g| g.title == section.category) {
                Some(group) => group.items.push(item),
                None => groups.push(NavGroup {
                    title: section.category.clone(),
                    items: vec![item],
                }),
            }
        }
        groups
    }
}

pub const STYLEGUIDE_TEMPLATE_NAME: &str = "layouts/styleguide.html";

/// Render `page` with `source`, or the built-in template when `None`.
pub fn render_styleguide(
    source: Option<String>,
    page: &StyleguidePage,
) -> Result<String, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template_owned(
        STYLEGUIDE_TEMPLATE_NAME,
        source.unwrap_or_else(|| STYLEGUIDE_TEMPLATE.to_string()),
    )?;

    env.get_template(STYLEGUIDE_TEMPLATE_NAME)?.render(context! {
        site_title => &page.site_title,
        base_url => &page.base_url,
        styles => &page.styles,
        nav => &page.nav,
        sections => &page.sections,
    })
}

const STYLEGUIDE_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Style guide - {{ site_title }}</title>
  {% for style in styles %}<link rel="stylesheet" href="{{ style }}">
  {% endfor %}<style>
    .sg-layout { display: grid; grid-template-columns: 240px 1fr; gap: 2rem; }
    .sg-nav { position: sticky; top: 0; align-self: start; padding: 1.5rem; }
    .sg-nav ul { list-style: none; padding: 0; }
    .sg-example { margin: 1rem 0; border: 1px solid #ddd; border-radius: 0.5rem; }
    .sg-preview { padding: 2rem; }
    .sg-source { border-top: 1px solid #ddd; padding: 0.5rem 1rem; }
  </style>
</head>
<body>
  <div class="sg-layout">
    <nav class="sg-nav">
      <a href="{{ base_url }}">{{ site_title }}</a>
      {% for group in nav %}
      {% if group.title %}<h2>{{ group.title }}</h2>{% endif %}
      <ul>
        {% for item in group.items %}<li><a href="#{{ item.id }}">{{ item.title }}</a></li>
        {% endfor %}
      </ul>
      {% endfor %}
    </nav>
    <main class="sg-main">
      {% for section in sections %}
      <section class="sg-section" id="{{ section.id }}">
        {% if section.description %}<p class="sg-description">{{ section.description }}</p>{% endif %}
        {{ section.html | safe }}
      </section>
      {% endfor %}
    </main>
  </div>
</body>
</html>"##;

#[cfg(test)]
mod tests {
    use super::*;

    fn section(title: &str, category: Option<&str>) -> Section {
        Section {
            title: title.to_string(),
            id: title.to_lowercase(),
            category: category.map(str::to_string),
            description: None,
            html: format!("<h1>{}</h1>", title),
        }
    }

    #[test]
    fn groups_navigation_by_category() {
        let sections = vec![
            section("Colours", Some("Foundations")),
            section("Buttons", Some("Components")),
            section("Type", Some("Foundations")),
            section("Changelog", None),
        ];

        let nav = StyleguidePage::build_nav(&sections);

        assert_eq!(nav.len(), 3);
        assert_eq!(nav[0].title.as_deref(), Some("Foundations"));
        assert_eq!(nav[0].items.len(), 2);
        assert_eq!(nav[2].title, None);
    }

    #[test]
    fn renders_builtin_template() {
        let sections = vec![section("Buttons", None)];
        let page = StyleguidePage {
            site_title: "Kiln".into(),
            base_url: "/".into(),
            styles: vec!["/assets/main.css".into()],
            nav: StyleguidePage::build_nav(&sections),
            sections,
        };

        let html = render_styleguide(None, &page).unwrap();

        assert!(html.contains("<title>Style guide - Kiln</title>"));
        assert!(html.contains("<section class=\"sg-section\" id=\"buttons\">"));
        assert!(html.contains("<h1>Buttons</h1>"));
        assert!(html.contains("<a href=\"#buttons\">Buttons</a>"));
    }

    #[test]
    fn custom_template_overrides_builtin() {
        let page = StyleguidePage {
            site_title: "Kiln".into(),
            base_url: "/".into(),
            styles: vec![],
            nav: vec![],
            sections: vec![section("Grid", None)],
        };

        let html = render_styleguide(
            Some("{% for s in sections %}[{{ s.title }}]{% endfor %}".into()),
            &page,
        )
        .unwrap();

        assert_eq!(html, "[Grid]");
    }
}
