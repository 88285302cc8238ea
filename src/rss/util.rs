//! Utility functions for RSS feed processing.

use once_cell::sync::Lazy;
use regex::bytes::{NoExpand, Regex};

/// Named entities that are valid HTML but undefined in XML, and what they
/// are rewritten to before decoding. This is not a general HTML entity decoder.
pub const ENTITY_REPLACEMENTS: &[(&str, &str)] = &[("&bull;", "&#8226;"), ("&nbsp;", "&#160;")];

static COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s-u)<!--.*?-->").expect("comment pattern is valid"));

static ENTITY_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    ENTITY_REPLACEMENTS
        .iter()
        .map(|(pattern, replacement)| {
            let regex =
                Regex::new(&regex::escape(pattern)).expect("escaped literal is a valid pattern");
            (regex, *replacement)
        })
        .collect()
});

/// Helper function to validate a URL
pub fn is_valid_url(url: &str) -> bool {
    if let Ok(parsed) = url::Url::parse(url) {
        parsed.scheme() == "http" || parsed.scheme() == "https"
    } else {
        false
    }
}

/// Best-effort cleanup before strict XML decoding: trims surrounding
/// whitespace and a UTF-8 BOM, strips comments, and applies [`ENTITY_REPLACEMENTS`].
pub fn preprocess_xml(data: &[u8]) -> Vec<u8> {
    let mut cleaned = data.trim_ascii();

    if let Some(rest) = cleaned.strip_prefix(b"\xEF\xBB\xBF".as_slice()) {
        cleaned = rest.trim_ascii_start();
    }

    let mut cleaned = COMMENT.replace_all(cleaned, b"".as_slice()).into_owned();

    for (regex, replacement) in ENTITY_RULES.iter() {
        cleaned = regex
            .replace_all(&cleaned, NoExpand(replacement.as_bytes()))
            .into_owned();
    }

    cleaned
}

/// The first `max` characters of a body, for log lines.
pub fn preview(data: &[u8], max: usize) -> String {
    String::from_utf8_lossy(data).chars().take(max).collect()
}
