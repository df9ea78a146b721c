//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small forum and run the full crawl
//! cycle end-to-end with the HTTP renderer and fallback fetcher.

use forum_archiver::archive::{write_page, ArchiveLayout};
use forum_archiver::config::{parse_config, Config};
use forum_archiver::crawler::run_crawl;
use forum_archiver::state::{Ledger, ThreadRef};
use forum_archiver::ArchiveError;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Matches requests to `/` whose query string is exactly the given one
struct RootQuery(&'static str);

impl Match for RootQuery {
    fn matches(&self, request: &Request) -> bool {
        request.url.path() == "/" && request.url.query() == Some(self.0)
    }
}

fn create_test_config(server: &MockServer, archive: &Path) -> Config {
    let mut config = parse_config(&format!(
        r#"
[forum]
domain = "127.0.0.1"

[crawler]
delay-ms = 0
persist-every = 2

[[sections]]
name = "News"
url = "{}/?f=5"
"#,
        server.uri()
    ))
    .expect("valid test config");
    config.output.archive_dir = archive.to_path_buf();
    config
}

fn html(body: &str) -> ResponseTemplate {
    let page = format!(
        "<html><head><title>Forum</title></head><body>{}<p>{}</p></body></html>",
        body,
        "Lorem ipsum dolor sit amet. ".repeat(12)
    );
    ResponseTemplate::new(200).set_body_raw(page.into_bytes(), "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, query: &'static str, body: &str) {
    Mock::given(method("GET"))
        .and(RootQuery(query))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// Two listing pages with four threads; thread 1 has an image, thread 2 a
/// broken one
async fn mount_forum(server: &MockServer) {
    mount_page(
        server,
        "f=5",
        r#"<table>
             <tr><td><a href="/?t=1">One</a></td></tr>
             <tr><td><a href="/?t=2">Two</a></td></tr>
             <tr><td><a href="/?t=3">Three</a></td></tr>
           </table>
           <a href="/?f=5&st=30">Next</a>"#,
    )
    .await;
    mount_page(
        server,
        "f=5&st=30",
        r#"<a href="/?t=4">Four</a> <a href="/?t=1">One again</a>"#,
    )
    .await;

    mount_page(server, "t=1", r#"<p>first</p><img src="/img/cat.png" loading="lazy">"#).await;
    mount_page(server, "t=2", r#"<p>second</p><img src="/img/login.png">"#).await;
    mount_page(
        server,
        "t=3",
        r#"<p>third</p><a href="/?t=3&st=30">2</a>"#,
    )
    .await;
    mount_page(server, "t=3&st=30", "<p>third, page two</p>").await;
    mount_page(server, "t=4", "<p>fourth</p>").await;

    Mock::given(method("GET"))
        .and(path("/img/cat.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89u8; 300], "image/png"))
        .mount(server)
        .await;

    // A login wall answering an image request with a document
    Mock::given(method("GET"))
        .and(path("/img/login.png"))
        .respond_with(html("<form>Please log in</form>"))
        .mount(server)
        .await;
}

fn thread(id: &str, title: &str) -> ThreadRef {
    ThreadRef::new(id, title, format!("/?t={}", id))
}

#[tokio::test]
async fn test_full_crawl_follows_listing_and_embeds_images() {
    let server = MockServer::start().await;
    mount_forum(&server).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, dir.path());
    let ledger_path = config.ledger_path();

    let summary = run_crawl(config, None).await.expect("crawl succeeds");
    let news = summary.section("News").unwrap();

    assert!(!summary.interrupted);
    assert_eq!(news.listing_renders, 2);
    assert_eq!(news.discovered, 4);
    assert_eq!(news.completed, 4);
    assert_eq!(news.threads_saved, 4);
    assert_eq!(news.pages_saved, 5);
    assert_eq!(news.assets.images_fallback, 1);
    assert_eq!(news.assets.not_found, 1);

    // Discovered list keeps encounter order across listing pages
    let ledger = Ledger::restore(&ledger_path).unwrap();
    let state = ledger.section("News").unwrap();
    let ids: Vec<_> = state.discovered().iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4"]);

    let layout = ArchiveLayout::new(dir.path());
    let first = std::fs::read_to_string(layout.thread_file("News", &thread("1", "One"))).unwrap();
    assert!(first.contains("data:image/png;base64,"));
    assert!(!first.contains("loading="));

    let second = std::fs::read_to_string(layout.thread_file("News", &thread("2", "Two"))).unwrap();
    assert!(second.contains(r#"src="/img/login.png""#));

    assert!(layout.page_file("News", &thread("3", "Three"), 1).exists());
    assert!(layout.page_file("News", &thread("3", "Three"), 2).exists());
    assert!(!layout.thread_file("News", &thread("3", "Three")).exists());
}

#[tokio::test]
async fn test_rerun_performs_no_work() {
    let server = MockServer::start().await;
    mount_forum(&server).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, dir.path());
    let ledger_path = config.ledger_path();

    run_crawl(config.clone(), None).await.unwrap();
    let requests_after_first = server.received_requests().await.unwrap().len();
    let ledger_before = std::fs::read_to_string(&ledger_path).unwrap();

    let summary = run_crawl(config, None).await.unwrap();
    let news = summary.section("News").unwrap();

    assert_eq!(news.listing_renders, 0);
    assert_eq!(news.skipped, 4);
    assert_eq!(news.pages_saved, 0);
    assert_eq!(server.received_requests().await.unwrap().len(), requests_after_first);
    assert_eq!(std::fs::read_to_string(&ledger_path).unwrap(), ledger_before);
}

#[tokio::test]
async fn test_existing_file_heals_thread_without_render() {
    let server = MockServer::start().await;
    mount_forum(&server).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, dir.path());

    let layout = ArchiveLayout::new(dir.path());
    write_page(
        &layout.thread_file("News", &thread("4", "Four")),
        &format!("<html>{}</html>", "saved earlier ".repeat(30)),
    )
    .unwrap();

    let summary = run_crawl(config, None).await.unwrap();
    let news = summary.section("News").unwrap();
    assert_eq!(news.healed, 1);
    assert_eq!(news.threads_saved, 3);
    assert_eq!(news.completed, 4);

    let rendered_four = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .any(|request| request.url.query() == Some("t=4"));
    assert!(!rendered_four);
}

#[tokio::test]
async fn test_failed_thread_is_retried_next_run() {
    let server = MockServer::start().await;
    mount_page(&server, "f=5", r#"<a href="/?t=1">One</a><a href="/?t=2">Two</a>"#).await;
    mount_page(&server, "t=1", "<p>first</p>").await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, dir.path());

    let summary = run_crawl(config.clone(), None).await.unwrap();
    let news = summary.section("News").unwrap();
    assert_eq!(news.render_failures, 1);
    assert_eq!(news.completed, 1);

    mount_page(&server, "t=2", "<p>second</p>").await;
    let summary = run_crawl(config, None).await.unwrap();
    let news = summary.section("News").unwrap();
    assert_eq!(news.listing_renders, 0);
    assert_eq!(news.skipped, 1);
    assert_eq!(news.threads_saved, 1);
    assert_eq!(news.completed, 2);
}

#[tokio::test]
async fn test_corrupt_ledger_aborts_without_overwriting() {
    let server = MockServer::start().await;
    mount_forum(&server).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, dir.path());
    let ledger_path = config.ledger_path();
    std::fs::write(&ledger_path, "{ truncated").unwrap();

    let result = run_crawl(config, None).await;
    assert!(matches!(result, Err(ArchiveError::Persistence { .. })));
    assert_eq!(std::fs::read_to_string(&ledger_path).unwrap(), "{ truncated");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_section_index_is_rejected() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, dir.path());

    let result = run_crawl(config, Some(vec![3])).await;
    assert!(matches!(result, Err(ArchiveError::Config(_))));
}
