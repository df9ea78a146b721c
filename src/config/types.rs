use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the archiver
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub forum: ForumConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub sections: Vec<SectionEntry>,
}

/// Describes the forum's URL scheme
#[derive(Debug, Clone, Deserialize)]
pub struct ForumConfig {
    /// Forum host (e.g., "forum.example.com" or "*.example.com")
    pub domain: String,

    /// Query parameter carrying the thread identifier
    #[serde(rename = "thread-param", default = "default_thread_param")]
    pub thread_param: String,

    /// Query parameter carrying the section identifier
    #[serde(rename = "section-param", default = "default_section_param")]
    pub section_param: String,

    /// Query parameter carrying the pagination offset
    #[serde(rename = "offset-param", default = "default_offset_param")]
    pub offset_param: String,

    /// Number of entries per listing / thread page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Additional query signatures that mark a URL as non-crawlable
    #[serde(rename = "extra-deny-patterns", default)]
    pub extra_deny_patterns: Vec<String>,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Politeness delay after every full-page render (milliseconds)
    #[serde(rename = "delay-ms", default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Maximum time to wait for a page to load
    #[serde(rename = "page-load-timeout-ms", default = "default_page_load_timeout_ms")]
    pub page_load_timeout_ms: u64,

    /// Maximum time to wait for the network to settle after load
    #[serde(rename = "settle-timeout-ms", default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: u64,

    /// Upper bound on the lazy-load scroll phase
    #[serde(rename = "scroll-timeout-ms", default = "default_scroll_timeout_ms")]
    pub scroll_timeout_ms: u64,

    /// Timeout for fallback asset and stylesheet fetches
    #[serde(rename = "asset-timeout-ms", default = "default_asset_timeout_ms")]
    pub asset_timeout_ms: u64,

    /// Persist the ledger every N completed threads
    #[serde(rename = "persist-every", default = "default_persist_every")]
    pub persist_every: u32,

    /// Inline images as base64 data URIs
    #[serde(rename = "embed-images", default = "default_true")]
    pub embed_images: bool,

    /// Inline linked stylesheets
    #[serde(rename = "embed-css", default)]
    pub embed_css: bool,

    /// User agent presented by the renderer and the fallback fetcher
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Browser locale
    #[serde(default = "default_locale")]
    pub locale: String,
}

/// Output locations for the crawl pass
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory of the offline archive
    #[serde(rename = "archive-dir", default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    /// Ledger file name, relative to the archive directory
    #[serde(rename = "ledger-file", default = "default_ledger_file")]
    pub ledger_file: String,
}

/// External media pass configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Root directory for downloaded videos
    #[serde(rename = "video-dir", default = "default_video_dir")]
    pub video_dir: PathBuf,

    /// Reference index file name, relative to the video directory
    #[serde(rename = "index-file", default = "default_index_file")]
    pub index_file: String,

    /// Downloader format selector
    #[serde(default = "default_format")]
    pub format: String,

    /// Optional downloader rate limit (e.g., "1M")
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: Option<String>,

    /// Downloader executable
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Per-identifier download timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_media_timeout_secs")]
    pub timeout_secs: u64,
}

/// A forum section to archive
#[derive(Debug, Clone, Deserialize)]
pub struct SectionEntry {
    /// Display name, also used as the section's directory name
    pub name: String,

    /// Root listing URL
    pub url: String,
}

impl Config {
    /// Full path of the ledger file
    pub fn ledger_path(&self) -> PathBuf {
        self.output.archive_dir.join(&self.output.ledger_file)
    }

    /// Full path of the reference index file
    pub fn index_path(&self) -> PathBuf {
        self.media.video_dir.join(&self.media.index_file)
    }
}

impl CrawlerConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_millis(self.page_load_timeout_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn scroll_timeout(&self) -> Duration {
        Duration::from_millis(self.scroll_timeout_ms)
    }

    pub fn asset_timeout(&self) -> Duration {
        Duration::from_millis(self.asset_timeout_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            page_load_timeout_ms: default_page_load_timeout_ms(),
            settle_timeout_ms: default_settle_timeout_ms(),
            scroll_timeout_ms: default_scroll_timeout_ms(),
            asset_timeout_ms: default_asset_timeout_ms(),
            persist_every: default_persist_every(),
            embed_images: true,
            embed_css: false,
            user_agent: default_user_agent(),
            locale: default_locale(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            archive_dir: default_archive_dir(),
            ledger_file: default_ledger_file(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            video_dir: default_video_dir(),
            index_file: default_index_file(),
            format: default_format(),
            rate_limit: None,
            binary: default_binary(),
            timeout_secs: default_media_timeout_secs(),
        }
    }
}

fn default_thread_param() -> String {
    "t".to_string()
}

fn default_section_param() -> String {
    "f".to_string()
}

fn default_offset_param() -> String {
    "st".to_string()
}

fn default_page_size() -> u32 {
    30
}

fn default_delay_ms() -> u64 {
    1500
}

fn default_page_load_timeout_ms() -> u64 {
    30_000
}

fn default_settle_timeout_ms() -> u64 {
    10_000
}

fn default_scroll_timeout_ms() -> u64 {
    20_000
}

fn default_asset_timeout_ms() -> u64 {
    15_000
}

fn default_persist_every() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
        .to_string()
}

fn default_locale() -> String {
    "it-IT".to_string()
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("./site_mirror")
}

fn default_ledger_file() -> String {
    ".scraper_state.json".to_string()
}

fn default_video_dir() -> PathBuf {
    PathBuf::from("./videos")
}

fn default_index_file() -> String {
    ".media_index.json".to_string()
}

fn default_format() -> String {
    "bestvideo[height<=720]+bestaudio/best[height<=720]/best".to_string()
}

fn default_binary() -> String {
    "yt-dlp".to_string()
}

fn default_media_timeout_secs() -> u64 {
    300
}
