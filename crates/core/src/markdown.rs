//! Chunk markers embedded in parsed markdown

use regex::Regex;
use std::sync::LazyLock;

/// `<a id='...'></a>` anchors the parser writes ahead of each chunk
static ANCHOR_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a\s+id\s*=\s*['"]([^'"]+)['"]\s*>\s*</a>"#).expect("valid anchor regex")
});

/// `<!-- chunk_id: ... -->` comments
static COMMENT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*chunk[_-]id\s*:\s*([^\s>]+)\s*-->").expect("valid comment regex")
});

/// Extract the first chunk identity marked up in a markdown snippet.
pub fn extract_chunk_id(markdown: &str) -> Option<String> {
    [&*ANCHOR_MARKER, &*COMMENT_MARKER]
        .iter()
        .filter_map(|marker| {
            marker
                .captures(markdown)
                .and_then(|caps| caps.get(1))
                .map(|m| (m.start(), m.as_str()))
        })
        .min_by_key(|(start, _)| *start)
        .map(|(_, id)| id.trim().to_string())
        .filter(|id| !id.is_empty())
}
