//! Style-guide document parsing and rendering.
//!
//! Style-guide entries are markdown files with optional YAML frontmatter.
//! Fenced `html example` blocks are rendered twice: once as live markup and
//! once as highlighted source, so every documented component shows next to
//! the snippet that produces it.

pub mod codeblock;
pub mod frontmatter;
pub mod parser;
pub mod render;

pub use codeblock::{BlockMode, CodeBlock, Language};
pub use frontmatter::{split_frontmatter, Frontmatter, FrontmatterError};
pub use parser::{parse_document, slugify, ParseError, StyleguideDoc, TocEntry};
pub use render::{escape_html, render_html};
