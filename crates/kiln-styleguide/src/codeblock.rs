//! Code block classification.

/// Language of a fenced code block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    Html,
    Css,
    JavaScript,
    Json,
    Bash,
    #[default]
    Unknown,
}

impl Language {
    /// Parse language from code fence info string.
    pub fn from_info(info: &str) -> Self {
        let lang = info.split_whitespace().next().unwrap_or("");
        match lang.to_lowercase().as_str() {
            "html" | "htm" => Self::Html,
            "css" => Self::Css,
            "js" | "javascript" | "mjs" => Self::JavaScript,
            "json" => Self::Json,
            "bash" | "sh" | "shell" => Self::Bash,
            _ => Self::Unknown,
        }
    }

    /// Class suffix used for syntax highlighting hooks.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Css => "css",
            Self::JavaScript => "javascript",
            Self::Json => "json",
            Self::Bash => "bash",
            Self::Unknown => "text",
        }
    }
}

/// How a block is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockMode {
    /// Render the markup live above its source
    Example,
    /// Source listing only
    #[default]
    Source,
}

impl BlockMode {
    pub fn from_info(info: &str) -> Self {
        if info
            .split_whitespace()
            .skip(1)
            .any(|word| word.eq_ignore_ascii_case("example"))
        {
            Self::Example
        } else {
            Self::Source
        }
    }
}

/// A fenced block found in a style-guide document.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    /// `example-{line}`
    pub id: String,
    pub language: Language,
    pub mode: BlockMode,
    pub source: String,
    /// 1-indexed, counted from the top of the file including frontmatter
    pub line_number: usize,
    /// Caption from `title="..."` in the info string
    pub caption: Option<String>,
}

impl CodeBlock {
    pub fn new(language: Language, mode: BlockMode, source: String, line_number: usize) -> Self {
        Self {
            id: format!("example-{}", line_number),
            language,
            mode,
            source,
            line_number,
            caption: None,
        }
    }

    /// Only HTML can be previewed in place.
    pub fn is_example(&self) -> bool {
        self.mode == BlockMode::Example && self.language == Language::Html
    }
}

/// Extract a caption from the info string.
///
/// Supports `title="Primary button"` and `title=Primary`.
pub fn extract_caption(info: &str) -> Option<String> {
    let start = info.find("title=")?;
    let rest = &info[start + 6..];

    if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted.find('"')?;
        let caption = &quoted[..end];
        return (!caption.is_empty()).then(|| caption.to_string());
    }

    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let caption = &rest[..end];
    (!caption.is_empty()).then(|| caption.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_language() {
        assert_eq!(Language::from_info("html example"), Language::Html);
        assert_eq!(Language::from_info("CSS"), Language::Css);
        assert_eq!(Language::from_info("js"), Language::JavaScript);
        assert_eq!(Language::from_info("tsx"), Language::Unknown);
    }

    #[test]
    fn parses_mode_from_flags_only() {
        assert_eq!(BlockMode::from_info("html example"), BlockMode::Example);
        assert_eq!(BlockMode::from_info("html"), BlockMode::Source);
        // the language word itself is never a flag
        assert_eq!(BlockMode::from_info("example"), BlockMode::Source);
    }

    #[test]
    fn extracts_caption() {
        assert_eq!(
            extract_caption("html example title=\"Primary button\""),
            Some("Primary button".to_string())
        );
        assert_eq!(extract_caption("html title=Card example"), Some("Card".to_string()));
        assert_eq!(extract_caption("html example"), None);
        assert_eq!(extract_caption("html title=\"\""), None);
    }

    #[test]
    fn only_html_examples_render() {
        let html = CodeBlock::new(Language::Html, BlockMode::Example, String::new(), 3);
        assert!(html.is_example());
        assert_eq!(html.id, "example-3");

        let css = CodeBlock::new(Language::Css, BlockMode::Example, String::new(), 1);
        assert!(!css.is_example());
    }
}
