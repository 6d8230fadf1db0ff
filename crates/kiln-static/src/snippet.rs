//! Live-reload client injection.

use std::sync::LazyLock;

use regex::Regex;

static BODY_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</body\s*>").expect("Invalid body close regex"));

/// Insert a `<script>` tag for `src` before the last `</body>`, or append it
/// when the document has no body tag.
pub fn inject_reload_script(html: &str, src: &str) -> String {
    let tag = format!(r#"<script src="{}" defer></script>"#, src);

    match BODY_CLOSE_RE.find_iter(html).last() {
        Some(m) => {
            let mut out = String::with_capacity(html.len() + tag.len() + 1);
            out.push_str(&html[..m.start()]);
            out.push_str(&tag);
            out.push('\n');
            out.push_str(&html[m.start()..]);
            out
        }
        None => format!("{}\n{}\n", html.trim_end(), tag),
    }
}
