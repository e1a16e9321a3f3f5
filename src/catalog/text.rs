//! Description cleanup for catalog entries.

use lazy_static::lazy_static;
use regex::Regex;

pub const NO_DESCRIPTION: &str = "No description";

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Plain-text description. HTML markup (rich-text descriptions are stored as
/// `<p>...</p>`) is stripped and whitespace collapsed.
pub fn clean_description(description: Option<&str>) -> String {
    let Some(raw) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return NO_DESCRIPTION.to_string();
    };

    let text = if raw.starts_with('<') {
        let stripped = HTML_TAG.replace_all(raw, " ");
        stripped
            .replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&")
    } else {
        raw.to_string()
    };

    let text = WHITESPACE.replace_all(text.trim(), " ").into_owned();
    if text.is_empty() {
        NO_DESCRIPTION.to_string()
    } else {
        text
    }
}

/// First `max_chars` characters followed by `...` when longer.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// First 8 characters of an entity id.
pub fn short_id(id: &str) -> String {
    truncate(id, 8)
}
