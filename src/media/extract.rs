//! YouTube reference extraction from saved pages
//!
//! Two passes run over each page and their results are unioned in
//! first-seen order: a pattern pass over the raw markup, which also finds
//! references inside scripts and broken markup, and a structural pass over
//! the attributes of link, frame and plugin elements.

use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

/// URL shapes that carry a video identifier
static REFERENCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)https?://(?:www\.)?youtube\.com/watch\?[^\s"'<>]*v=[A-Za-z0-9_-]{11}[^\s"'<>]*"#,
        r#"(?i)https?://youtu\.be/[A-Za-z0-9_-]{11}[^\s"'<>]*"#,
        r#"(?i)https?://(?:www\.)?youtube\.com/embed/[A-Za-z0-9_-]{11}[^\s"'<>]*"#,
        r#"(?i)https?://(?:www\.)?youtube\.com/shorts/[A-Za-z0-9_-]{11}[^\s"'<>]*"#,
        r#"(?i)https?://(?:www\.)?youtube-nocookie\.com/embed/[A-Za-z0-9_-]{11}[^\s"'<>]*"#,
        r#"(?i)https?://(?:www\.)?youtube\.com/v/[A-Za-z0-9_-]{11}[^\s"'<>]*"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid reference pattern"))
    .collect()
});

static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:youtube\.com/(?:watch\?.*?v=|embed/|v/|shorts/)|youtu\.be/|youtube-nocookie\.com/embed/)([A-Za-z0-9_-]{11})",
    )
    .expect("valid video id pattern")
});

/// Elements and attributes inspected by the structural pass
const STRUCTURAL_SOURCES: &[(&str, &[&str])] = &[
    ("a[href]", &["href"]),
    ("iframe[src]", &["src"]),
    ("embed, object, source", &["src", "data", "value"]),
    ("param", &["value"]),
];

/// Extracts the 11-character video identifier from a reference
///
/// # Examples
///
/// ```
/// use forum_archiver::media::video_id;
///
/// assert_eq!(video_id("https://youtu.be/dQw4w9WgXcQ?t=10").as_deref(), Some("dQw4w9WgXcQ"));
/// assert_eq!(video_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
/// assert_eq!(video_id("https://example.com/watch?v=dQw4w9WgXcQ"), None);
/// ```
pub fn video_id(reference: &str) -> Option<String> {
    VIDEO_ID
        .captures(reference)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Canonical watch URL of a video identifier
pub fn canonical_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Lists the video identifiers referenced by a page, in first-seen order
pub fn extract_media_ids(markup: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for id in pattern_pass(markup)
        .into_iter()
        .chain(structural_pass(markup))
    {
        if seen.insert(id.clone()) {
            ids.push(id);
        }
    }

    ids
}

/// Matches every reference shape over the raw text, in document order
fn pattern_pass(markup: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = REFERENCE_PATTERNS
        .iter()
        .flat_map(|pattern| pattern.find_iter(markup))
        .filter_map(|m| video_id(m.as_str()).map(|id| (m.start(), id)))
        .collect();

    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, id)| id).collect()
}

fn structural_pass(markup: &str) -> Vec<String> {
    let document = Html::parse_document(markup);
    let mut ids = Vec::new();

    for (selector, attributes) in STRUCTURAL_SOURCES {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        for element in document.select(&selector) {
            for attribute in *attributes {
                if let Some(id) = element.value().attr(attribute).and_then(video_id) {
                    ids.push(id);
                }
            }
        }
    }

    ids
}
