//! HTML parser for forum listing and thread pages
//!
//! This module extracts from rendered markup:
//! - thread links on a section listing page
//! - the link to the next listing page
//! - the pagination links of a thread

use crate::config::ForumConfig;
use crate::state::ThreadRef;
use crate::url::{classify, normalize, thread_url};
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// What a section listing page links to
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// Thread links in document order, one per thread id
    pub threads: Vec<ThreadRef>,

    /// Next listing page of the same section, if any
    pub next: Option<Url>,
}

/// One page of a thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadPage {
    pub offset: u64,
    pub url: Url,
}

/// Resolved `<a href>` targets with their visible text, in document order
fn anchors(document: &Html, base_url: &Url) -> Vec<(Url, String)> {
    let Ok(a_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&a_selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let url = normalize(href, base_url)?;
            Some((url, anchor_text(&element)))
        })
        .collect()
}

fn anchor_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a section listing page
///
/// # Thread Links
///
/// Links that are in the forum domain, carry a thread id and are not an
/// excluded action. Each thread id is reported once; the anchor text of its
/// first link is the title, or `Thread <id>` when that text is empty.
///
/// # Next Link
///
/// The first link, in document order, with the same section id as
/// `page_url` and a pagination offset strictly greater than the current
/// one (a missing offset counts as 0).
///
/// # Example
///
/// ```
/// use forum_archiver::config::parse_config;
/// use forum_archiver::crawler::parse_listing;
/// use url::Url;
///
/// let config = parse_config(r#"
/// [forum]
/// domain = "forum.example.com"
///
/// [[sections]]
/// name = "News"
/// url = "https://forum.example.com/?f=1"
/// "#).unwrap();
///
/// let html = r#"<a href="?t=7">Hello</a> <a href="?f=1&st=30">2</a>"#;
/// let page_url = Url::parse("https://forum.example.com/?f=1").unwrap();
/// let listing = parse_listing(html, &page_url, &config.forum);
/// assert_eq!(listing.threads[0].title, "Hello");
/// assert_eq!(listing.next.unwrap().as_str(), "https://forum.example.com/?f=1&st=30");
/// ```
pub fn parse_listing(html: &str, page_url: &Url, forum: &ForumConfig) -> ListingPage {
    let document = Html::parse_document(html);
    let current = classify(page_url, forum);
    let current_offset = current.offset_or_zero();

    let mut seen = HashSet::new();
    let mut threads = Vec::new();
    let mut next = None;

    for (url, text) in anchors(&document, page_url) {
        let class = classify(&url, forum);

        if class.is_crawlable_thread() {
            if let Some(id) = class.thread_id.as_deref() {
                if seen.insert(id.to_string()) {
                    let title = if text.is_empty() {
                        format!("Thread {}", id)
                    } else {
                        text
                    };
                    let canonical = thread_url(&url, forum, id);
                    threads.push(ThreadRef::new(id, title, canonical.as_str()));
                }
            }
            continue;
        }

        if next.is_none()
            && class.section_id.is_some()
            && class.section_id == current.section_id
            && class.offset.map(|offset| offset > current_offset).unwrap_or(false)
        {
            next = Some(url);
        }
    }

    ListingPage { threads, next }
}

/// Lists the pages of a thread from its first rendered page
///
/// Offset 0 is always the thread URL itself. Other pages come from links
/// sharing the thread id and carrying a pagination offset; when several
/// links name the same offset the last one wins. The result is sorted by
/// offset.
pub fn discover_thread_pages(html: &str, thread_url: &Url, forum: &ForumConfig) -> Vec<ThreadPage> {
    let document = Html::parse_document(html);
    let thread_id = classify(thread_url, forum).thread_id;

    let mut pages: BTreeMap<u64, Url> = BTreeMap::new();
    pages.insert(0, thread_url.clone());

    for (url, _) in anchors(&document, thread_url) {
        let class = classify(&url, forum);
        if !class.in_domain || class.is_excluded_action || class.thread_id != thread_id {
            continue;
        }
        if let Some(offset) = class.offset {
            if offset > 0 {
                pages.insert(offset, url);
            }
        }
    }

    pages
        .into_iter()
        .map(|(offset, url)| ThreadPage { offset, url })
        .collect()
}
