//! HTML rendering for style-guide entries.

use pulldown_cmark::{html, CowStr, Event, Parser, Tag, TagEnd};

use crate::codeblock::CodeBlock;
use crate::parser::{markdown_options, StyleguideDoc};

/// Render a parsed entry's body to HTML.
///
/// Headings get the anchor ids listed in `doc.toc`. Example blocks become a
/// preview container holding the raw markup followed by its escaped source;
/// every other block is emitted as a plain listing.
pub fn render_html(doc: &StyleguideDoc) -> String {
    let mut events = Vec::new();
    let mut blocks = doc.code_blocks.iter();
    let mut headings = doc.toc.iter();
    let mut in_block = false;

    for event in Parser::new_ext(&doc.content, markdown_options()) {
        match event {
            Event::Start(Tag::CodeBlock(_)) => {
                in_block = true;
                if let Some(block) = blocks.next() {
                    events.push(Event::Html(CowStr::from(render_block(block))));
                }
            }
            Event::End(TagEnd::CodeBlock) => in_block = false,
            _ if in_block => {}

            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                let id = id.or_else(|| headings.next().map(|e| CowStr::from(e.id.clone())));
                events.push(Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                }));
            }

            other => events.push(other),
        }
    }

    let mut out = String::new();
    html::push_html(&mut out, events.into_iter());
    out
}

fn render_block(block: &CodeBlock) -> String {
    let listing = format!(
        "<pre><code class=\"language-{}\">{}</code></pre>\n",
        block.language.as_str(),
        escape_html(&block.source)
    );

    if !block.is_example() {
        return listing;
    }

    let caption = block
        .caption
        .as_deref()
        .map(|c| format!("<figcaption>{}</figcaption>\n", escape_html(c)))
        .unwrap_or_default();

    format!(
        "<figure class=\"sg-example\" id=\"{id}\">\n{caption}<div class=\"sg-preview\">\n{markup}</div>\n<details class=\"sg-source\"><summary>Source</summary>\n{listing}</details>\n</figure>\n",
        id = block.id,
        markup = block.source,
    )
}

/// Escape text for use inside HTML element content or attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
