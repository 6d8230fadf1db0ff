//! Frontmatter extraction and parsing.

use serde::Deserialize;

/// Metadata at the top of a style-guide entry.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Frontmatter {
    /// Entry title (required)
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Group heading in the style-guide navigation
    #[serde(default)]
    pub category: Option<String>,

    /// Position within the style guide (lower = first)
    #[serde(default)]
    pub order: Option<i32>,

    /// Leave the entry out of the generated page
    #[serde(default)]
    pub hidden: bool,
}

/// Split `source` into frontmatter and body.
///
/// Returns the parsed frontmatter and the remaining content after the
/// frontmatter block.
pub fn extract_frontmatter(source: &str) -> Result<(Option<Frontmatter>, &str), FrontmatterError> {
    let (yaml, remaining) = split_frontmatter(source)?;
    let Some(yaml) = yaml else {
        return Ok((None, remaining));
    };

    let frontmatter: Frontmatter =
        serde_yaml::from_str(yaml).map_err(|e| FrontmatterError::InvalidYaml(e.to_string()))?;

    Ok((Some(frontmatter), remaining))
}

/// Split off a `---` delimited block without interpreting it.
pub fn split_frontmatter(source: &str) -> Result<(Option<&str>, &str), FrontmatterError> {
    let trimmed = source.trim_start();

    if !trimmed.starts_with("---") {
        return Ok((None, source));
    }

    let after_open = &trimmed[3..];
    let Some(close_pos) = after_open.find("\n---") else {
        return Err(FrontmatterError::Unclosed);
    };

    let yaml = after_open[..close_pos].trim();
    let remaining = &after_open[close_pos + 4..];

    Ok((Some(yaml), remaining.trim_start()))
}

#[derive(Debug, thiserror::Error)]
pub enum FrontmatterError {
    #[error("Unclosed frontmatter block - missing closing ---")]
    Unclosed,

    #[error("Invalid YAML in frontmatter: {0}")]
    InvalidYaml(String),
}
