//! Integration tests for the media pass
//!
//! A fake resolver stands in for the external downloader.

use async_trait::async_trait;
use forum_archiver::archive::{write_page, ArchiveLayout};
use forum_archiver::config::{parse_config, Config};
use forum_archiver::media::{
    run_media_with, MediaOptions, MediaResolver, MediaStatus, ReferenceIndex, ResolveOutcome,
};
use forum_archiver::ArchiveError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

const A: &str = "AAAAAAAAAAA";
const B: &str = "BBBBBBBBBBB";
const C: &str = "CCCCCCCCCCC";

/// Answers with a fixed outcome per identifier and records every call
struct FakeResolver {
    outcomes: HashMap<&'static str, ResolveOutcome>,
    calls: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeResolver {
    fn new(outcomes: &[(&'static str, ResolveOutcome)]) -> Self {
        Self {
            outcomes: outcomes.iter().cloned().collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn called_ids(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(id, _)| id.clone()).collect()
    }
}

#[async_trait]
impl MediaResolver for FakeResolver {
    async fn resolve(&self, video_id: &str, output_dir: &Path) -> ResolveOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((video_id.to_string(), output_dir.to_path_buf()));
        self.outcomes
            .get(video_id)
            .cloned()
            .unwrap_or_else(|| ResolveOutcome::Failed("no such video".to_string()))
    }
}

fn downloaded(name: &str) -> ResolveOutcome {
    ResolveOutcome::Downloaded {
        path: Some(PathBuf::from(name)),
        title: Some(name.to_string()),
    }
}

fn create_test_config(root: &Path) -> Config {
    let mut config = parse_config(
        r#"
[forum]
domain = "forum.example.com"

[[sections]]
name = "News"
url = "https://forum.example.com/?f=1"

[[sections]]
name = "Off topic"
url = "https://forum.example.com/?f=2"
"#,
    )
    .expect("valid test config");
    config.output.archive_dir = root.join("site_mirror");
    config.media.video_dir = root.join("videos");
    config
}

fn options() -> MediaOptions {
    MediaOptions {
        pause: Duration::ZERO,
        ..MediaOptions::default()
    }
}

fn link(id: &str) -> String {
    format!(r#"<a href="https://www.youtube.com/watch?v={}">video</a>"#, id)
}

/// News references A then B; Off topic references A and C
fn write_archive(config: &Config) {
    let layout = ArchiveLayout::new(config.output.archive_dir.clone());
    write_page(
        &layout.section_dir("News").join("1_first.html"),
        &format!("{}{}", link(A), link(B)),
    )
    .unwrap();
    write_page(
        &layout.section_dir("Off topic").join("2_second").join("page_1.html"),
        &format!(r#"<iframe src="https://www.youtube.com/embed/{}"></iframe>{}"#, C, link(A)),
    )
    .unwrap();
}

#[tokio::test]
async fn test_missing_archive_fails_fast() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let resolver = FakeResolver::new(&[]);

    let result = run_media_with(&config, &options(), &resolver).await;
    assert!(matches!(result, Err(ArchiveError::CorpusMissing(_))));
    assert!(resolver.called_ids().is_empty());
}

#[tokio::test]
async fn test_scan_only_merges_without_resolving() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    write_archive(&config);
    let resolver = FakeResolver::new(&[]);

    let summary = run_media_with(
        &config,
        &MediaOptions {
            scan_only: true,
            ..options()
        },
        &resolver,
    )
    .await
    .unwrap();

    assert!(summary.scan_only);
    assert!(resolver.called_ids().is_empty());
    assert_eq!(summary.section("News").unwrap().referenced, 2);
    assert_eq!(summary.section("Off topic").unwrap().referenced, 2);

    let index = ReferenceIndex::load(&config.index_path()).unwrap();
    assert_eq!(index.len(), 3);
    let a = index.get(A).unwrap();
    assert_eq!(a.sections.as_slice(), &["News", "Off topic"]);
    assert_eq!(
        a.source_pages.as_slice(),
        &["News/1_first.html", "Off topic/2_second/page_1.html"]
    );
    assert_eq!(a.status, MediaStatus::Pending);
}

#[tokio::test]
async fn test_resolves_pending_in_first_seen_order() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    write_archive(&config);
    let resolver = FakeResolver::new(&[
        (A, downloaded("a.mp4")),
        (B, ResolveOutcome::Unavailable("Private video".to_string())),
        (C, ResolveOutcome::Failed("HTTP Error 503".to_string())),
    ]);

    let summary = run_media_with(&config, &options(), &resolver).await.unwrap();

    // A is terminal by the time Off topic is processed
    assert_eq!(resolver.called_ids(), vec![A, B, C]);
    let calls = resolver.calls.lock().unwrap().clone();
    assert_eq!(calls[0].1, config.media.video_dir.join("News"));
    assert_eq!(calls[2].1, config.media.video_dir.join("Off topic"));

    let news = summary.section("News").unwrap();
    assert_eq!((news.downloaded, news.unavailable), (1, 1));
    let off_topic = summary.section("Off topic").unwrap();
    assert_eq!((off_topic.skipped, off_topic.failed), (1, 1));

    let index = ReferenceIndex::load(&config.index_path()).unwrap();
    assert_eq!(index.status(A), Some(MediaStatus::Downloaded));
    assert_eq!(index.get(A).unwrap().local_file.as_deref(), Some("a.mp4"));
    assert_eq!(index.status(B), Some(MediaStatus::Unavailable));
    assert_eq!(index.status(C), Some(MediaStatus::Failed));
}

#[tokio::test]
async fn test_failed_entries_wait_for_retry_request() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    write_archive(&config);

    let first = FakeResolver::new(&[
        (A, ResolveOutcome::Unavailable("Video unavailable".to_string())),
        (B, ResolveOutcome::Failed("timeout".to_string())),
        (C, downloaded("c.mp4")),
    ]);
    run_media_with(&config, &options(), &first).await.unwrap();

    // Without a retry request nothing is pending
    let second = FakeResolver::new(&[(B, downloaded("b.mp4"))]);
    run_media_with(&config, &options(), &second).await.unwrap();
    assert!(second.called_ids().is_empty());

    let retry = MediaOptions {
        retry_failed: true,
        ..options()
    };
    run_media_with(&config, &retry, &second).await.unwrap();
    assert_eq!(second.called_ids(), vec![B]);

    let index = ReferenceIndex::load(&config.index_path()).unwrap();
    assert_eq!(index.status(A), Some(MediaStatus::Unavailable));
    assert_eq!(index.status(B), Some(MediaStatus::Downloaded));
    assert_eq!(index.status(C), Some(MediaStatus::Downloaded));
}

#[tokio::test]
async fn test_max_per_section_caps_attempts() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    write_archive(&config);
    let resolver = FakeResolver::new(&[(A, downloaded("a.mp4")), (B, downloaded("b.mp4"))]);

    let summary = run_media_with(
        &config,
        &MediaOptions {
            sections: Some(vec![0]),
            max_per_section: Some(1),
            ..options()
        },
        &resolver,
    )
    .await
    .unwrap();

    assert_eq!(resolver.called_ids(), vec![A]);
    assert_eq!(summary.sections.len(), 1);
    let news = summary.section("News").unwrap();
    assert_eq!((news.downloaded, news.skipped), (1, 1));

    let index = ReferenceIndex::load(&config.index_path()).unwrap();
    assert_eq!(index.status(B), Some(MediaStatus::Pending));
    assert!(index.get(C).is_none());
}
