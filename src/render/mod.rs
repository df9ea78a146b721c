//! Page rendering collaborators
//!
//! A [`Renderer`] loads one page at a time and hands back the final markup
//! together with the session's cookies. While a page loads, every transport
//! response the renderer sees is offered to the shared [`AssetCache`](crate::assets::AssetCache) so
//! images can be embedded without a second download.
//!
//! Two implementations are provided:
//! - [`HttpRenderer`]: plain HTTP with a session cookie jar (default)
//! - `ChromiumRenderer`: headless Chromium, behind the `browser` feature

mod http;

#[cfg(feature = "browser")]
mod chromium;

#[cfg(feature = "browser")]
pub use chromium::ChromiumRenderer;
pub use http::HttpRenderer;

use crate::config::CrawlerConfig;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// URL patterns whose loads are suppressed during rendering
pub const BLOCKED_MEDIA_PATTERNS: &[&str] = &["*.mp4", "*.webm", "*.ogg", "*.avi", "*.flv"];

/// Rendering errors
///
/// A render failure is transient from the crawler's point of view: the item
/// is logged and skipped, and the next run retries it.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Timed out loading {url}")]
    Timeout { url: String },

    #[error("Blocked media URL: {url}")]
    Blocked { url: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Renderer unavailable: {0}")]
    Unavailable(String),
}

/// A page to render
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub url: Url,

    /// Scroll the page to trigger lazy-loaded images before capture
    pub scroll_lazy: bool,
}

impl RenderRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            scroll_lazy: false,
        }
    }

    pub fn with_scroll(mut self, scroll_lazy: bool) -> Self {
        self.scroll_lazy = scroll_lazy;
        self
    }
}

/// A cookie of the rendering session, reused by fallback fetches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
}

impl SessionCookie {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
        }
    }

    /// Returns true when the cookie would be sent to `host`
    ///
    /// A leading dot on the cookie domain is ignored; the cookie applies to
    /// that domain and every subdomain of it.
    pub fn applies_to(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.').to_ascii_lowercase();
        let host = host.to_ascii_lowercase();
        !domain.is_empty() && (host == domain || host.ends_with(&format!(".{}", domain)))
    }
}

/// Builds a `Cookie` header value for a request to `url`
pub fn cookie_header(url: &Url, cookies: &[SessionCookie]) -> Option<String> {
    let host = url.host_str()?;
    let pairs: Vec<String> = cookies
        .iter()
        .filter(|cookie| cookie.applies_to(host))
        .map(|cookie| format!("{}={}", cookie.name, cookie.value))
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

/// Result of rendering one page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// URL after redirects
    pub final_url: Url,
    /// Serialized document
    pub markup: String,
    /// Session cookies at the end of the render
    pub cookies: Vec<SessionCookie>,
}

/// Timing and identity settings shared by renderers
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub user_agent: String,
    pub locale: String,
    pub page_load_timeout: Duration,
    pub settle_timeout: Duration,
    pub scroll_timeout: Duration,
}

impl RenderSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            locale: config.locale.clone(),
            page_load_timeout: config.page_load_timeout(),
            settle_timeout: config.settle_timeout(),
            scroll_timeout: config.scroll_timeout(),
        }
    }
}

/// Loads pages and reports their transport responses
#[async_trait]
pub trait Renderer: Send {
    /// Renders one page
    ///
    /// Image responses observed while loading are written to the renderer's
    /// [`AssetCache`](crate::assets::AssetCache).
    async fn render(&mut self, request: &RenderRequest) -> Result<RenderedPage, RenderError>;

    /// Tears down the rendering session
    async fn close(&mut self) -> Result<(), RenderError>;
}

/// Returns true when the URL matches one of [`BLOCKED_MEDIA_PATTERNS`]
pub fn is_blocked_media(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    BLOCKED_MEDIA_PATTERNS
        .iter()
        .filter_map(|pattern| pattern.strip_prefix('*'))
        .any(|suffix| path.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_domain_matching() {
        let cookie = SessionCookie::new("sid", "abc", ".forumfree.it");
        assert!(cookie.applies_to("forumfree.it"));
        assert!(cookie.applies_to("board.forumfree.it"));
        assert!(!cookie.applies_to("img.example.com"));
        assert!(!cookie.applies_to("notforumfree.it"));

        let empty = SessionCookie::new("x", "y", "");
        assert!(!empty.applies_to("forumfree.it"));
    }

    #[test]
    fn test_cookie_header() {
        let cookies = vec![
            SessionCookie::new("sid", "abc", "forum.example.com"),
            SessionCookie::new("pref", "it", ".example.com"),
            SessionCookie::new("other", "1", "cdn.other.org"),
        ];

        let url = Url::parse("https://forum.example.com/img/a.png").unwrap();
        assert_eq!(
            cookie_header(&url, &cookies).as_deref(),
            Some("sid=abc; pref=it")
        );

        let url = Url::parse("https://unrelated.net/a.png").unwrap();
        assert!(cookie_header(&url, &cookies).is_none());
    }

    #[test]
    fn test_is_blocked_media() {
        assert!(is_blocked_media(
            &Url::parse("https://cdn.example.com/clip.MP4").unwrap()
        ));
        assert!(is_blocked_media(
            &Url::parse("https://cdn.example.com/a/b.webm?x=1").unwrap()
        ));
        assert!(!is_blocked_media(
            &Url::parse("https://cdn.example.com/a.png").unwrap()
        ));
    }
}
