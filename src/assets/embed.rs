//! Rewrites rendered markup so images and stylesheets travel with the page
//!
//! Embedding runs in three steps:
//! 1. a read-only `scraper` pass collects image sources, inline style
//!    `url(...)` references and stylesheet links
//! 2. each reference is resolved through the transport cache, falling back
//!    to an authenticated fetch
//! 3. a streaming `lol_html` pass writes the resolved payloads back

use crate::assets::cache::{AssetCache, CachedAsset, CaptureTier};
use crate::assets::fetch::{AssetFetcher, Resolution};
use crate::render::SessionCookie;
use crate::url::normalize;
use lol_html::html_content::ContentType;
use lol_html::{element, HtmlRewriter, Settings};
use regex::{Captures, Regex};
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// Image source attributes, in priority order
pub const SOURCE_ATTRIBUTES: &[&str] = &[
    "src",
    "data-src",
    "data-lazy-src",
    "data-original",
    "data-url",
    "data-image",
];

/// Attributes removed from an image once its payload is embedded
const LAZY_ATTRIBUTES: &[&str] = &[
    "data-src",
    "data-lazy-src",
    "data-original",
    "data-url",
    "data-image",
    "srcset",
    "loading",
];

/// Absolute `url(...)` references inside CSS text
static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*["']?(https?://[^"')\s]+)["']?\s*\)"#).expect("valid CSS url pattern")
});

/// Errors rewriting markup
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("HTML rewrite error: {0}")]
    Rewrite(String),

    #[error("Rewritten HTML is not valid UTF-8")]
    Encoding,
}

/// Per-page tallies of the embedding pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbedStats {
    /// Images embedded from transport capture
    pub images_transport: usize,
    /// Images embedded from a fallback fetch
    pub images_fallback: usize,
    /// Inline style references embedded
    pub backgrounds: usize,
    /// Fallback fetches that produced an asset
    pub fallback_fetches: usize,
    /// References the fallback answered with a non-image
    pub not_found: usize,
    /// References whose fallback request failed
    pub fetch_failed: usize,
    pub stylesheets_inlined: usize,
    pub stylesheets_failed: usize,
}

impl EmbedStats {
    pub fn images(&self) -> usize {
        self.images_transport + self.images_fallback
    }

    pub fn misses(&self) -> usize {
        self.not_found + self.fetch_failed
    }

    pub fn merge(&mut self, other: &EmbedStats) {
        self.images_transport += other.images_transport;
        self.images_fallback += other.images_fallback;
        self.backgrounds += other.backgrounds;
        self.fallback_fetches += other.fallback_fetches;
        self.not_found += other.not_found;
        self.fetch_failed += other.fetch_failed;
        self.stylesheets_inlined += other.stylesheets_inlined;
        self.stylesheets_failed += other.stylesheets_failed;
    }
}

/// A payload ready to be written into the markup
#[derive(Debug, Clone)]
struct Embedding {
    data_uri: String,
    tier: CaptureTier,
}

impl From<&CachedAsset> for Embedding {
    fn from(asset: &CachedAsset) -> Self {
        Self {
            data_uri: asset.data_uri(),
            tier: asset.tier,
        }
    }
}

/// Two-tier asset resolution and markup rewriting for one render session
pub struct AssetPipeline<F> {
    cache: Arc<AssetCache>,
    fetcher: F,
}

impl<F: AssetFetcher> AssetPipeline<F> {
    pub fn new(cache: Arc<AssetCache>, fetcher: F) -> Self {
        Self { cache, fetcher }
    }

    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.cache
    }

    /// Resolves one asset, cache first, then an authenticated fetch
    ///
    /// The cache is tried with the resolved URL and with the reference as
    /// written in the page. A successful fetch is cached under the resolved
    /// URL; misses leave the cache untouched.
    async fn resolve(
        &self,
        resolved: &Url,
        written: &str,
        cookies: &[SessionCookie],
        stats: &mut EmbedStats,
    ) -> Option<Arc<CachedAsset>> {
        if let Some(asset) = self
            .cache
            .get(resolved.as_str())
            .or_else(|| self.cache.get(written))
        {
            return Some(asset);
        }

        match self.fetcher.fetch_asset(resolved, cookies).await {
            Resolution::Found(asset) => {
                stats.fallback_fetches += 1;
                Some(self.cache.put(resolved.as_str(), asset))
            }
            Resolution::NotFound => {
                stats.not_found += 1;
                debug!(url = %resolved, "Asset not available as an image");
                None
            }
            Resolution::FetchFailed(reason) => {
                stats.fetch_failed += 1;
                debug!(url = %resolved, reason = %reason, "Asset fetch failed");
                None
            }
        }
    }

    /// Replaces image sources and inline style backgrounds with data URIs
    ///
    /// Images that cannot be resolved keep their remote source. Running the
    /// pass again over its own output changes nothing.
    pub async fn embed_images(
        &self,
        markup: &str,
        page_url: &Url,
        cookies: &[SessionCookie],
    ) -> Result<(String, EmbedStats), EmbedError> {
        let mut stats = EmbedStats::default();
        let (image_sources, style_urls) = collect_image_references(markup, page_url);

        let mut images: HashMap<String, Embedding> = HashMap::new();
        for (written, resolved) in image_sources {
            if let Some(asset) = self.resolve(&resolved, &written, cookies, &mut stats).await {
                images.insert(written, Embedding::from(&*asset));
            }
        }

        let mut backgrounds: HashMap<String, Embedding> = HashMap::new();
        for raw in style_urls {
            let Ok(resolved) = Url::parse(&raw) else {
                continue;
            };
            if let Some(asset) = self.resolve(&resolved, &raw, cookies, &mut stats).await {
                backgrounds.insert(raw, Embedding::from(&*asset));
            }
        }

        if images.is_empty() && backgrounds.is_empty() {
            return Ok((markup.to_string(), stats));
        }

        let (output, counts) = rewrite_images(markup, page_url, &images, &backgrounds)?;
        stats.images_transport = counts.transport;
        stats.images_fallback = counts.fallback;
        stats.backgrounds = counts.backgrounds;

        if stats.images() + stats.backgrounds > 0 {
            info!(
                images = stats.images(),
                backgrounds = stats.backgrounds,
                from_cache = stats.images_transport,
                downloaded = stats.fallback_fetches,
                "Embedded images"
            );
        }

        Ok((output, stats))
    }

    /// Replaces linked stylesheets with inline `<style>` elements
    ///
    /// Absolute `url(...)` references inside each sheet are embedded with
    /// the same two-tier resolution. Sheets that fail to fetch stay linked.
    pub async fn inline_stylesheets(
        &self,
        markup: &str,
        page_url: &Url,
        cookies: &[SessionCookie],
    ) -> Result<(String, EmbedStats), EmbedError> {
        let mut stats = EmbedStats::default();
        let links = collect_stylesheet_links(markup, page_url);

        let mut sheets: HashMap<String, String> = HashMap::new();
        for (written, resolved) in links {
            let css = match self.fetcher.fetch_text(&resolved, cookies).await {
                Ok(css) => css,
                Err(e) => {
                    stats.stylesheets_failed += 1;
                    debug!(url = %resolved, error = %e, "Stylesheet fetch failed");
                    continue;
                }
            };

            let css = self.embed_css_urls(&css, cookies, &mut stats).await;
            sheets.insert(written, css);
        }

        if sheets.is_empty() {
            return Ok((markup.to_string(), stats));
        }

        let (output, inlined) = rewrite_stylesheets(markup, &sheets)?;
        stats.stylesheets_inlined = inlined;
        if inlined > 0 {
            info!(stylesheets = inlined, "Inlined stylesheets");
        }

        Ok((output, stats))
    }

    /// Embeds every absolute `url(...)` reference inside CSS text
    async fn embed_css_urls(
        &self,
        css: &str,
        cookies: &[SessionCookie],
        stats: &mut EmbedStats,
    ) -> String {
        let mut resolved: HashMap<String, String> = HashMap::new();
        for raw in css_urls(css) {
            if resolved.contains_key(&raw) {
                continue;
            }
            let Ok(url) = Url::parse(&raw) else {
                continue;
            };
            if let Some(asset) = self.resolve(&url, &raw, cookies, stats).await {
                resolved.insert(raw, asset.data_uri());
            }
        }

        CSS_URL
            .replace_all(css, |caps: &Captures| match resolved.get(&caps[1]) {
                Some(data_uri) => format!("url('{}')", data_uri),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

/// Picks the source an image should be resolved from
///
/// The first candidate attribute holding a non-empty value that is not a
/// `data:` URI and resolves to an http(s) URL wins.
pub fn pick_image_source<G>(get: G, page_url: &Url) -> Option<(String, Url)>
where
    G: Fn(&str) -> Option<String>,
{
    SOURCE_ATTRIBUTES.iter().find_map(|attr| {
        let value = get(*attr)?;
        let value = value.trim();
        if value.is_empty() || value.to_ascii_lowercase().starts_with("data:") {
            return None;
        }
        normalize(value, page_url).map(|url| (value.to_string(), url))
    })
}

/// Absolute URLs referenced through `url(...)` in CSS text
pub fn css_urls(css: &str) -> Vec<String> {
    CSS_URL
        .captures_iter(css)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Decodes character references in a raw attribute value
///
/// `lol_html` hands attributes over as written, while `scraper` decodes
/// them; lookups between the two passes go through this.
fn decode_attribute(value: &str) -> String {
    html_escape::decode_html_entities(value).into_owned()
}

/// Collects unique image sources and inline style URLs in document order
fn collect_image_references(markup: &str, page_url: &Url) -> (Vec<(String, Url)>, Vec<String>) {
    let document = Html::parse_document(markup);

    let mut sources: Vec<(String, Url)> = Vec::new();
    let mut style_urls: Vec<String> = Vec::new();

    if let Ok(img_selector) = Selector::parse("img") {
        for img in document.select(&img_selector) {
            let element = img.value();
            if let Some((written, resolved)) =
                pick_image_source(|attr| element.attr(attr).map(str::to_string), page_url)
            {
                if !sources.iter().any(|(seen, _)| *seen == written) {
                    sources.push((written, resolved));
                }
            }
        }
    }

    if let Ok(style_selector) = Selector::parse("[style]") {
        for styled in document.select(&style_selector) {
            let Some(style) = styled.value().attr("style") else {
                continue;
            };
            for raw in css_urls(style) {
                if !style_urls.contains(&raw) {
                    style_urls.push(raw);
                }
            }
        }
    }

    (sources, style_urls)
}

fn is_stylesheet(rel: &str) -> bool {
    rel.split_ascii_whitespace()
        .any(|token| token.eq_ignore_ascii_case("stylesheet"))
}

/// Collects `<link rel="stylesheet" href>` targets in document order
fn collect_stylesheet_links(markup: &str, page_url: &Url) -> Vec<(String, Url)> {
    let document = Html::parse_document(markup);

    let mut links: Vec<(String, Url)> = Vec::new();
    let Ok(link_selector) = Selector::parse("link[rel][href]") else {
        return links;
    };
    for link in document.select(&link_selector) {
        let element = link.value();
        if !element.attr("rel").map(is_stylesheet).unwrap_or(false) {
            continue;
        }
        let Some(href) = element.attr("href").map(str::trim) else {
            continue;
        };
        if let Some(resolved) = normalize(href, page_url) {
            if !links.iter().any(|(seen, _)| seen == href) {
                links.push((href.to_string(), resolved));
            }
        }
    }
    links
}

#[derive(Debug, Default)]
struct RewriteCounts {
    transport: usize,
    fallback: usize,
    backgrounds: usize,
}

fn run_rewriter<'h>(
    markup: &str,
    settings: Settings<'h, '_>,
    output: &mut Vec<u8>,
) -> Result<(), EmbedError> {
    let mut rewriter = HtmlRewriter::new(settings, |c: &[u8]| output.extend_from_slice(c));
    rewriter
        .write(markup.as_bytes())
        .map_err(|e| EmbedError::Rewrite(e.to_string()))?;
    rewriter
        .end()
        .map_err(|e| EmbedError::Rewrite(e.to_string()))
}

/// Writes resolved image payloads back into the markup
fn rewrite_images(
    markup: &str,
    page_url: &Url,
    images: &HashMap<String, Embedding>,
    backgrounds: &HashMap<String, Embedding>,
) -> Result<(String, RewriteCounts), EmbedError> {
    let mut output = Vec::with_capacity(markup.len());
    let mut transport = 0usize;
    let mut fallback = 0usize;
    let mut styled = 0usize;

    run_rewriter(
        markup,
        Settings {
            element_content_handlers: vec![
                element!("img", |el| {
                    let picked = pick_image_source(
                        |attr| el.get_attribute(attr).map(|v| decode_attribute(&v)),
                        page_url,
                    );
                    let Some(embedding) = picked.and_then(|(written, _)| images.get(&written))
                    else {
                        return Ok(());
                    };

                    el.set_attribute("src", &embedding.data_uri)?;
                    for attr in LAZY_ATTRIBUTES {
                        el.remove_attribute(attr);
                    }
                    match embedding.tier {
                        CaptureTier::Transport => transport += 1,
                        CaptureTier::Fallback => fallback += 1,
                    }
                    Ok(())
                }),
                element!("[style]", |el| {
                    let Some(style) = el.get_attribute("style") else {
                        return Ok(());
                    };
                    let mut rewritten = decode_attribute(&style);
                    let mut changed = false;
                    for raw in css_urls(&rewritten) {
                        if let Some(embedding) = backgrounds.get(&raw) {
                            rewritten = rewritten.replace(&raw, &embedding.data_uri);
                            styled += 1;
                            changed = true;
                        }
                    }
                    if changed {
                        el.set_attribute("style", &rewritten)?;
                    }
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        &mut output,
    )?;

    let output = String::from_utf8(output).map_err(|_| EmbedError::Encoding)?;
    Ok((
        output,
        RewriteCounts {
            transport,
            fallback,
            backgrounds: styled,
        },
    ))
}

/// Replaces resolved stylesheet links with `<style>` elements
fn rewrite_stylesheets(
    markup: &str,
    sheets: &HashMap<String, String>,
) -> Result<(String, usize), EmbedError> {
    let mut output = Vec::with_capacity(markup.len());
    let mut inlined = 0usize;

    run_rewriter(
        markup,
        Settings {
            element_content_handlers: vec![element!("link[rel][href]", |el| {
                if !el.get_attribute("rel").map(|r| is_stylesheet(&r)).unwrap_or(false) {
                    return Ok(());
                }
                let Some(href) = el.get_attribute("href") else {
                    return Ok(());
                };
                let href = decode_attribute(href.trim());
                if let Some(css) = sheets.get(&href) {
                    let css = css.replace("</style", "<\\/style");
                    el.replace(&format!("<style>{}</style>", css), ContentType::Html);
                    inlined += 1;
                }
                Ok(())
            })],
            ..Settings::default()
        },
        &mut output,
    )?;

    let output = String::from_utf8(output).map_err(|_| EmbedError::Encoding)?;
    Ok((output, inlined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::fetch::FetchError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves canned resolutions and counts the requests made
    #[derive(Default)]
    struct FakeFetcher {
        assets: HashMap<String, Resolution>,
        sheets: HashMap<String, String>,
        asset_calls: AtomicUsize,
        requested: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn with_asset(mut self, url: &str, resolution: Resolution) -> Self {
            self.assets.insert(url.to_string(), resolution);
            self
        }

        fn with_sheet(mut self, url: &str, css: &str) -> Self {
            self.sheets.insert(url.to_string(), css.to_string());
            self
        }
    }

    #[async_trait]
    impl AssetFetcher for FakeFetcher {
        async fn fetch_asset(&self, url: &Url, _cookies: &[SessionCookie]) -> Resolution {
            self.asset_calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(url.to_string());
            self.assets
                .get(url.as_str())
                .cloned()
                .unwrap_or(Resolution::FetchFailed("connection refused".to_string()))
        }

        async fn fetch_text(
            &self,
            url: &Url,
            _cookies: &[SessionCookie],
        ) -> Result<String, FetchError> {
            self.sheets.get(url.as_str()).cloned().ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    fn page_url() -> Url {
        Url::parse("https://forum.example.com/?t=1").unwrap()
    }

    fn fallback_png() -> Resolution {
        Resolution::Found(CachedAsset::new(
            "image/png",
            vec![7u8; 150],
            CaptureTier::Fallback,
        ))
    }

    #[tokio::test]
    async fn test_transport_capture_needs_no_fallback() {
        let cache = Arc::new(AssetCache::new());
        let bytes = vec![1u8; 200];
        cache.observe("https://img.example.com/a.png", Some("image/png"), &bytes);

        let pipeline = AssetPipeline::new(Arc::clone(&cache), FakeFetcher::default());
        let markup = r#"<html><body><img src="https://img.example.com/a.png"></body></html>"#;

        let (out, stats) = pipeline
            .embed_images(markup, &page_url(), &[])
            .await
            .unwrap();

        let expected = crate::assets::mime::data_uri("image/png", &bytes);
        assert!(out.contains(&format!("src=\"{}\"", expected)));
        assert_eq!(stats.images_transport, 1);
        assert_eq!(stats.images_fallback, 0);
        assert_eq!(pipeline.fetcher.asset_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_fetch_embeds_and_caches() {
        let cache = Arc::new(AssetCache::new());
        let fetcher = FakeFetcher::default()
            .with_asset("https://forum.example.com/img/b.png", fallback_png());
        let pipeline = AssetPipeline::new(Arc::clone(&cache), fetcher);

        let markup = r#"<img src="/img/b.png" alt="b"><img src="/img/b.png">"#;
        let (out, stats) = pipeline
            .embed_images(markup, &page_url(), &[])
            .await
            .unwrap();

        assert_eq!(out.matches("data:image/png;base64,").count(), 2);
        assert!(out.contains("alt=\"b\""));
        assert_eq!(stats.images_fallback, 2);
        assert_eq!(stats.fallback_fetches, 1);
        assert!(cache.get("https://forum.example.com/img/b.png").is_some());
    }

    #[tokio::test]
    async fn test_html_response_leaves_image_remote() {
        let cache = Arc::new(AssetCache::new());
        let fetcher = FakeFetcher::default()
            .with_asset("https://img.example.com/private.jpg", Resolution::NotFound);
        let pipeline = AssetPipeline::new(Arc::clone(&cache), fetcher);

        let markup = r#"<img src="https://img.example.com/private.jpg">"#;
        let (out, stats) = pipeline
            .embed_images(markup, &page_url(), &[])
            .await
            .unwrap();

        assert!(out.contains("https://img.example.com/private.jpg"));
        assert!(!out.contains("data:"));
        assert_eq!(stats.not_found, 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_entity_encoded_sources_are_embedded() {
        let cache = Arc::new(AssetCache::new());
        cache.observe("https://img.example.com/a.php?x=1&y=2", Some("image/png"), &[3u8; 200]);
        cache.observe("https://img.example.com/b.php?x=1&y=2", Some("image/png"), &[4u8; 200]);
        let pipeline = AssetPipeline::new(Arc::clone(&cache), FakeFetcher::default());

        let markup = concat!(
            r#"<img src="https://img.example.com/a.php?x=1&#38;y=2">"#,
            r#"<img src="https://img.example.com/b.php?x=1&#x26;y=2">"#
        );
        let (out, stats) = pipeline
            .embed_images(markup, &page_url(), &[])
            .await
            .unwrap();

        assert_eq!(out.matches("data:image/png;base64,").count(), 2);
        assert!(!out.contains("img.example.com"));
        assert_eq!(stats.images_transport, 2);
        assert_eq!(pipeline.fetcher.asset_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lazy_attributes_are_candidates_and_stripped() {
        let fetcher = FakeFetcher::default()
            .with_asset("https://img.example.com/real.jpg", fallback_png());
        let pipeline = AssetPipeline::new(Arc::new(AssetCache::new()), fetcher);

        let markup = r#"<img src="data:image/gif;base64,R0lGOD" data-src="https://img.example.com/real.jpg" srcset="x 2x" loading="lazy">"#;
        let (out, stats) = pipeline
            .embed_images(markup, &page_url(), &[])
            .await
            .unwrap();

        assert_eq!(stats.images(), 1);
        assert!(!out.contains("data-src"));
        assert!(!out.contains("srcset"));
        assert!(!out.contains("loading"));
        assert!(out.contains("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_embedding_is_idempotent() {
        let fetcher = FakeFetcher::default()
            .with_asset("https://img.example.com/real.jpg", fallback_png());
        let pipeline = AssetPipeline::new(Arc::new(AssetCache::new()), fetcher);

        let markup = r#"<img data-src="https://img.example.com/real.jpg">"#;
        let (once, _) = pipeline
            .embed_images(markup, &page_url(), &[])
            .await
            .unwrap();
        let (twice, stats) = pipeline.embed_images(&once, &page_url(), &[]).await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(stats, EmbedStats::default());
    }

    #[tokio::test]
    async fn test_inline_style_background() {
        let fetcher = FakeFetcher::default()
            .with_asset("https://img.example.com/bg.png", fallback_png());
        let pipeline = AssetPipeline::new(Arc::new(AssetCache::new()), fetcher);

        let markup = r#"<div style="background: url('https://img.example.com/bg.png') no-repeat">x</div>"#;
        let (out, stats) = pipeline
            .embed_images(markup, &page_url(), &[])
            .await
            .unwrap();

        assert_eq!(stats.backgrounds, 1);
        assert!(out.contains("data:image/png;base64,"));
        assert!(!out.contains("https://img.example.com/bg.png"));
    }

    #[tokio::test]
    async fn test_failed_fetch_is_counted() {
        let pipeline = AssetPipeline::new(Arc::new(AssetCache::new()), FakeFetcher::default());
        let markup = r#"<img src="https://down.example.com/x.png">"#;

        let (out, stats) = pipeline
            .embed_images(markup, &page_url(), &[])
            .await
            .unwrap();

        assert_eq!(out, markup);
        assert_eq!(stats.fetch_failed, 1);
        assert_eq!(stats.misses(), 1);
    }

    #[tokio::test]
    async fn test_inline_stylesheets() {
        let fetcher = FakeFetcher::default()
            .with_sheet(
                "https://forum.example.com/skin/style.css",
                "body { background: url(https://img.example.com/bg.png); }",
            )
            .with_asset("https://img.example.com/bg.png", fallback_png());
        let pipeline = AssetPipeline::new(Arc::new(AssetCache::new()), fetcher);

        let markup = concat!(
            r#"<html><head><link rel="stylesheet" href="/skin/style.css">"#,
            r#"<link rel="stylesheet" href="/skin/missing.css"></head><body></body></html>"#
        );
        let (out, stats) = pipeline
            .inline_stylesheets(markup, &page_url(), &[])
            .await
            .unwrap();

        assert_eq!(stats.stylesheets_inlined, 1);
        assert_eq!(stats.stylesheets_failed, 1);
        assert!(out.contains("<style>body { background: url('data:image/png;base64,"));
        assert!(out.contains(r#"href="/skin/missing.css""#));
        assert!(!out.contains("/skin/style.css"));
    }

    #[test]
    fn test_pick_image_source_priority() {
        let attrs: HashMap<&str, &str> = [
            ("src", ""),
            ("data-src", "javascript:void(0)"),
            ("data-lazy-src", "/img/lazy.png"),
            ("data-original", "/img/original.png"),
        ]
        .into_iter()
        .collect();

        let (written, url) = pick_image_source(
            |attr| attrs.get(attr).map(|v| v.to_string()),
            &page_url(),
        )
        .unwrap();
        assert_eq!(written, "/img/lazy.png");
        assert_eq!(url.as_str(), "https://forum.example.com/img/lazy.png");
    }

    #[test]
    fn test_css_urls() {
        let css = r#"a { background: url("https://a.com/x.png"); } b { background: url(/rel.png) }"#;
        assert_eq!(css_urls(css), vec!["https://a.com/x.png".to_string()]);
    }
}
