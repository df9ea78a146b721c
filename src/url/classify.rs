use crate::config::ForumConfig;
use crate::url::matches_wildcard;
use url::Url;

/// Query signatures of forum actions that must never be crawled
///
/// Matched case-insensitively against the full URL. Profile pages, login
/// forms, report dialogs and single-post permalinks all carry a thread id
/// on some forums and would otherwise be mistaken for thread pages.
pub const DENY_PATTERNS: &[&str] = &[
    "act=Profile",
    "act=Reg",
    "act=Login",
    "act=Logout",
    "act=Report",
    "act=Trackprefs",
    "act=xmlout",
    "act=rss",
    "act=Msg",
    "act=Mail",
    "act=calendar",
    "act=Help",
    "act=Search",
    "act=Stats",
    "act=Online",
    "act=Forward",
    "do=cfrm",
    "do=report",
    "do=new_post",
    "showuser=",
    "CODE=",
    "pid=",
];

/// What a URL means within the forum's URL scheme
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlClass {
    /// Host matches the configured forum domain
    pub in_domain: bool,

    /// Carries a thread id and is not an excluded action
    pub is_thread: bool,

    /// Matches one of the deny-list signatures
    pub is_excluded_action: bool,

    pub thread_id: Option<String>,
    pub section_id: Option<String>,

    /// Pagination offset; absent or non-numeric values are `None`
    pub offset: Option<u64>,
}

impl UrlClass {
    /// True for links the crawler may follow as thread pages
    pub fn is_crawlable_thread(&self) -> bool {
        self.in_domain && self.is_thread
    }

    /// Offset with the missing value read as the first page
    pub fn offset_or_zero(&self) -> u64 {
        self.offset.unwrap_or(0)
    }
}

/// Classifies a URL against the forum's URL scheme
///
/// The deny-list takes precedence over thread detection: a URL carrying
/// both a thread id and an excluded action is never a thread.
///
/// # Examples
///
/// ```
/// use forum_archiver::config::parse_config;
/// use forum_archiver::url::classify;
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
/// let url = Url::parse("https://forum.example.com/?t=42&st=30").unwrap();
/// let class = classify(&url, &config.forum);
/// assert!(class.is_thread);
/// assert_eq!(class.thread_id.as_deref(), Some("42"));
/// assert_eq!(class.offset, Some(30));
/// ```
pub fn classify(url: &Url, forum: &ForumConfig) -> UrlClass {
    let in_domain = url
        .host_str()
        .map(|host| matches_wildcard(&forum.domain, host))
        .unwrap_or(false);

    let is_excluded_action = is_excluded(url, forum);
    let thread_id = query_param(url, &forum.thread_param).filter(|id| !id.is_empty());
    let section_id = query_param(url, &forum.section_param).filter(|id| !id.is_empty());
    let offset = query_param(url, &forum.offset_param).and_then(|raw| raw.parse::<u64>().ok());

    UrlClass {
        in_domain,
        is_thread: thread_id.is_some() && !is_excluded_action,
        is_excluded_action,
        thread_id,
        section_id,
        offset,
    }
}

/// Checks the URL against the built-in and configured deny-lists
fn is_excluded(url: &Url, forum: &ForumConfig) -> bool {
    let haystack = url.as_str().to_ascii_lowercase();

    DENY_PATTERNS
        .iter()
        .copied()
        .chain(forum.extra_deny_patterns.iter().map(String::as_str))
        .any(|pattern| haystack.contains(&pattern.to_ascii_lowercase()))
}

/// Returns the first value of a query parameter
pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.trim().to_string())
}

/// Maps a pagination offset to a 1-based page number
///
/// # Examples
///
/// ```
/// use forum_archiver::url::page_number;
///
/// assert_eq!(page_number(0, 30), 1);
/// assert_eq!(page_number(30, 30), 2);
/// assert_eq!(page_number(59, 30), 2);
/// ```
pub fn page_number(offset: u64, page_size: u32) -> u64 {
    offset / u64::from(page_size.max(1)) + 1
}

/// Builds the canonical URL of a thread, on the host of `base`
pub fn thread_url(base: &Url, forum: &ForumConfig, thread_id: &str) -> Url {
    let mut url = base.clone();
    url.set_path("/");
    url.set_fragment(None);
    url.query_pairs_mut()
        .clear()
        .append_pair(&forum.thread_param, thread_id);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forum() -> ForumConfig {
        ForumConfig {
            domain: "forum.example.com".to_string(),
            thread_param: "t".to_string(),
            section_param: "f".to_string(),
            offset_param: "st".to_string(),
            page_size: 30,
            extra_deny_patterns: vec!["act=Poll".to_string()],
        }
    }

    fn classify_str(raw: &str) -> UrlClass {
        classify(&Url::parse(raw).unwrap(), &forum())
    }

    #[test]
    fn test_thread_url_classified() {
        let class = classify_str("https://forum.example.com/?t=123&st=60");
        assert!(class.in_domain);
        assert!(class.is_thread);
        assert!(!class.is_excluded_action);
        assert_eq!(class.thread_id.as_deref(), Some("123"));
        assert_eq!(class.offset, Some(60));
        assert!(class.section_id.is_none());
    }

    #[test]
    fn test_section_listing_classified() {
        let class = classify_str("https://forum.example.com/?f=55&st=30");
        assert!(!class.is_thread);
        assert_eq!(class.section_id.as_deref(), Some("55"));
        assert_eq!(class.offset_or_zero(), 30);
    }

    #[test]
    fn test_excluded_action_wins_over_thread() {
        let class = classify_str("https://forum.example.com/?act=Post&CODE=02&t=123");
        assert!(class.is_excluded_action);
        assert!(!class.is_thread);
        assert_eq!(class.thread_id.as_deref(), Some("123"));

        let class = classify_str("https://forum.example.com/?t=123&pid=999");
        assert!(!class.is_thread);
    }

    #[test]
    fn test_deny_list_is_case_insensitive() {
        let class = classify_str("https://forum.example.com/?ACT=profile&t=5");
        assert!(class.is_excluded_action);
    }

    #[test]
    fn test_extra_deny_patterns() {
        let class = classify_str("https://forum.example.com/?act=Poll&t=9");
        assert!(class.is_excluded_action);
        assert!(!class.is_thread);
    }

    #[test]
    fn test_out_of_domain() {
        let class = classify_str("https://other.org/?t=123");
        assert!(!class.in_domain);
        assert!(class.is_thread);
        assert!(!class.is_crawlable_thread());
    }

    #[test]
    fn test_non_numeric_offset_ignored() {
        let class = classify_str("https://forum.example.com/?t=1&st=abc");
        assert_eq!(class.offset, None);
        assert_eq!(class.offset_or_zero(), 0);
    }

    #[test]
    fn test_page_number() {
        assert_eq!(page_number(0, 30), 1);
        assert_eq!(page_number(29, 30), 1);
        assert_eq!(page_number(30, 30), 2);
        assert_eq!(page_number(59, 30), 2);
        assert_eq!(page_number(60, 30), 3);
        assert_eq!(page_number(20, 10), 3);
    }

    #[test]
    fn test_thread_url_is_canonical() {
        let base = Url::parse("https://forum.example.com/?f=10&st=30#x").unwrap();
        let url = thread_url(&base, &forum(), "777");
        assert_eq!(url.as_str(), "https://forum.example.com/?t=777");
    }
}
