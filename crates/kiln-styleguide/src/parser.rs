//! Style-guide document parser.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use crate::codeblock::{extract_caption, BlockMode, CodeBlock, Language};
use crate::frontmatter::{extract_frontmatter, Frontmatter, FrontmatterError};

/// A parsed style-guide entry.
#[derive(Debug, Clone)]
pub struct StyleguideDoc {
    pub frontmatter: Option<Frontmatter>,

    /// Markdown body (without frontmatter)
    pub content: String,

    pub code_blocks: Vec<CodeBlock>,

    pub toc: Vec<TocEntry>,
}

impl StyleguideDoc {
    /// Frontmatter title, else the first heading, else `fallback`.
    pub fn title_or(&self, fallback: &str) -> String {
        self.frontmatter
            .as_ref()
            .map(|f| f.title.clone())
            .or_else(|| self.toc.first().map(|e| e.title.clone()))
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn examples(&self) -> impl Iterator<Item = &CodeBlock> {
        self.code_blocks.iter().filter(|b| b.is_example())
    }
}

/// A heading in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    pub title: String,
    /// Anchor ID
    pub id: String,
    /// Heading level (1-6)
    pub level: u8,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Frontmatter error: {0}")]
    Frontmatter(#[from] FrontmatterError),
}

pub(crate) fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
}

/// Parse a style-guide entry.
///
/// Extracts frontmatter, fenced code blocks and the heading outline.
pub fn parse_document(source: &str) -> Result<StyleguideDoc, ParseError> {
    let (frontmatter, content) = extract_frontmatter(source)?;

    // `content` is a suffix of `source`
    let body_offset = source.len() - content.len();
    let line_offset = source[..body_offset].matches('\n').count();

    let mut code_blocks = Vec::new();
    let mut toc = Vec::new();

    let mut current_block: Option<(String, usize, String)> = None; // (info, line, text)
    let mut current_heading: Option<(u8, String)> = None;

    for (event, range) in Parser::new_ext(content, markdown_options()).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let info = match &kind {
                    CodeBlockKind::Fenced(info) => info.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                let line = content[..range.start].matches('\n').count() + 1 + line_offset;
                current_block = Some((info, line, String::new()));
            }

            Event::End(TagEnd::CodeBlock) => {
                if let Some((info, line, text)) = current_block.take() {
                    let mut block = CodeBlock::new(
                        Language::from_info(&info),
                        BlockMode::from_info(&info),
                        text,
                        line,
                    );
                    block.caption = extract_caption(&info);
                    code_blocks.push(block);
                }
            }

            Event::Text(text) | Event::Code(text) => {
                if let Some((_, _, ref mut buf)) = current_block {
                    buf.push_str(&text);
                } else if let Some((_, ref mut heading)) = current_heading {
                    heading.push_str(&text);
                }
            }

            Event::Start(Tag::Heading { level, .. }) => {
                current_heading = Some((level as u8, String::new()));
            }

            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, title)) = current_heading.take() {
                    let id = slugify(&title);
                    toc.push(TocEntry { title, id, level });
                }
            }

            _ => {}
        }
    }

    Ok(StyleguideDoc {
        frontmatter,
        content: content.to_string(),
        code_blocks,
        toc,
    })
}

/// Convert a heading to a URL-safe slug.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_complete_entry() {
        let source = r#"---
title: Buttons
description: Calls to action
---

# Buttons

Use one primary button per view.

```html example title="Primary"
<button class="btn btn-primary">Save</button>
```

## Markup

```css
.btn { padding: 0.5rem 1rem; }
```
"#;

        let doc = parse_document(source).unwrap();

        let fm = doc.frontmatter.as_ref().unwrap();
        assert_eq!(fm.title, "Buttons");
        assert_eq!(fm.description.as_deref(), Some("Calls to action"));

        assert_eq!(doc.code_blocks.len(), 2);

        let example = &doc.code_blocks[0];
        assert_eq!(example.language, Language::Html);
        assert_eq!(example.mode, BlockMode::Example);
        assert_eq!(example.caption.as_deref(), Some("Primary"));
        assert_eq!(example.line_number, 10);
        assert!(example.source.contains("btn-primary"));

        let listing = &doc.code_blocks[1];
        assert_eq!(listing.language, Language::Css);
        assert!(!listing.is_example());

        assert_eq!(doc.examples().count(), 1);
        assert_eq!(
            doc.toc,
            vec![
                TocEntry {
                    title: "Buttons".into(),
                    id: "buttons".into(),
                    level: 1
                },
                TocEntry {
                    title: "Markup".into(),
                    id: "markup".into(),
                    level: 2
                },
            ]
        );
    }

    #[test]
    fn falls_back_to_first_heading_for_title() {
        let doc = parse_document("# Colour `tokens`\n\nPalette.").unwrap();

        assert!(doc.frontmatter.is_none());
        assert_eq!(doc.title_or("colours"), "Colour tokens");

        let empty = parse_document("Just text.").unwrap();
        assert_eq!(empty.title_or("typography"), "typography");
    }

    #[test]
    fn slugify_works() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Form (Inputs)"), "form-inputs");
        assert_eq!(slugify("  Multiple   Spaces  "), "multiple-spaces");
    }
}
