//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run whole
//! crawl jobs through the registry and the HTTP renderer.

use sitelore::config::Config;
use sitelore::crawler::JobRegistry;
use sitelore::render::HttpRenderer;
use sitelore::storage::{
    DocumentStore, MemoryStoreProvider, SqliteDocumentStore, SqliteStoreProvider,
};
use sitelore::{CrawlState, SiteloreError};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> Config {
    let mut config = Config::default();
    config.crawler.user_agent = "Mozilla/5.0 (compatible; TestBot/1.0;)".to_string();
    config.crawler.crawl_delay_ms = 10;
    config.crawler.request_timeout_secs = 5;
    config
}

fn html_page(title: &str, main: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<li><a href="{}">{}</a></li>"#, href, href))
        .collect();
    format!(
        r#"<html>
<head><title>{title}</title></head>
<body>
  <nav>Site navigation</nav>
  <main class="content"><h1>{title}</h1><p>{main}</p></main>
  <ul>{anchors}</ul>
  <footer>Copyright</footer>
</body>
</html>"#
    )
}

async fn mount_robots(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, page: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html"))
        .mount(server)
        .await;
}

fn memory_registry(config: Config) -> (JobRegistry, Arc<MemoryStoreProvider>) {
    let stores = Arc::new(MemoryStoreProvider::new());
    let registry = JobRegistry::new(
        config,
        Arc::new(HttpRenderer::new(Duration::from_secs(5))),
        stores.clone(),
    );
    (registry, stores)
}

#[tokio::test]
async fn test_full_crawl_stays_on_site() {
    let server = MockServer::start().await;
    let external = MockServer::start().await;
    let external_link = format!("{}/c", external.uri());

    mount_robots(&server, 200, "User-agent: *\nAllow: /").await;
    mount_page(
        &server,
        "/",
        html_page("Home", "Welcome home", &["/a", "/b", &external_link]),
    )
    .await;
    mount_page(&server, "/a", html_page("A", "Alpha page", &["/b", "/"])).await;
    mount_page(&server, "/b", html_page("B", "Beta page", &[])).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&external)
        .await;

    let (registry, stores) = memory_registry(test_config());
    let job = registry
        .start(&server.uri(), Some(10), Some(5), None)
        .await
        .expect("job should start");

    assert_eq!(job.wait_settled().await, CrawlState::Completed);

    let progress = registry.progress(job.site_id()).await.unwrap();
    assert_eq!(progress.visited_count, 3);
    assert_eq!(progress.remaining_count, 0);
    assert!(progress.last_run_started_at.is_some());

    let documents = stores.store(job.site_id()).unwrap().documents();
    assert_eq!(documents.len(), 3);

    let home = documents
        .iter()
        .find(|d| d.title == "Home")
        .expect("home page should be stored");
    assert!(home.content.contains("Welcome home"));
    assert!(!home.content.contains("Site navigation"));

    registry.shutdown().await;
}

#[tokio::test]
async fn test_robots_disallowed_paths_are_not_fetched() {
    let server = MockServer::start().await;

    mount_robots(&server, 200, "User-agent: *\nDisallow: /private").await;
    mount_page(
        &server,
        "/",
        html_page("Home", "Public home", &["/private/report", "/public"]),
    )
    .await;
    mount_page(&server, "/public", html_page("Public", "Open data", &[])).await;

    Mock::given(method("GET"))
        .and(path("/private/report"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (registry, _stores) = memory_registry(test_config());
    let job = registry
        .start(&server.uri(), Some(10), Some(2), None)
        .await
        .unwrap();

    assert_eq!(job.wait_settled().await, CrawlState::Completed);
    assert_eq!(job.progress().visited_count, 2);
}

#[tokio::test]
async fn test_override_ignores_robots() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
        .expect(0)
        .mount(&server)
        .await;
    mount_page(&server, "/", html_page("Home", "Home", &["/docs"])).await;
    mount_page(&server, "/docs", html_page("Docs", "Docs", &[])).await;

    let (registry, _stores) = memory_registry(test_config());
    let job = registry
        .start(&server.uri(), Some(10), Some(2), Some(true))
        .await
        .unwrap();

    assert_eq!(job.wait_settled().await, CrawlState::Completed);
    assert_eq!(job.progress().visited_count, 2);
}

#[tokio::test]
async fn test_forbidden_robots_disallows_everything() {
    let server = MockServer::start().await;

    mount_robots(&server, 403, "").await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (registry, _stores) = memory_registry(test_config());
    let job = registry
        .start(&server.uri(), Some(10), Some(2), None)
        .await
        .unwrap();

    assert_eq!(job.wait_settled().await, CrawlState::Completed);
    assert_eq!(job.progress().visited_count, 0);
}

#[tokio::test]
async fn test_missing_robots_allows_everything() {
    let server = MockServer::start().await;

    mount_robots(&server, 404, "Not Found").await;
    mount_page(&server, "/", html_page("Home", "Only page", &[])).await;

    let (registry, _stores) = memory_registry(test_config());
    let job = registry
        .start(&server.uri(), Some(10), Some(2), None)
        .await
        .unwrap();

    assert_eq!(job.wait_settled().await, CrawlState::Completed);
    assert_eq!(job.progress().visited_count, 1);
}

#[tokio::test]
async fn test_non_html_pages_are_not_visited() {
    let server = MockServer::start().await;

    mount_robots(&server, 404, "").await;
    mount_page(&server, "/", html_page("Home", "Home", &["/report.pdf"])).await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 16], "application/pdf"))
        .expect(1)
        .mount(&server)
        .await;

    let (registry, stores) = memory_registry(test_config());
    let job = registry
        .start(&server.uri(), Some(10), Some(2), None)
        .await
        .unwrap();

    assert_eq!(job.wait_settled().await, CrawlState::Completed);
    assert_eq!(job.progress().visited_count, 1);
    assert_eq!(stores.store(job.site_id()).unwrap().documents().len(), 1);
}

#[tokio::test]
async fn test_duplicate_start_and_restart_after_stop() {
    let server = MockServer::start().await;

    mount_robots(&server, 404, "").await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(html_page("Slow", "Slow page", &[]), "text/html")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let (registry, stores) = memory_registry(test_config());
    let first = registry
        .start(&server.uri(), Some(10), Some(2), None)
        .await
        .unwrap();

    let duplicate = registry.start(&server.uri(), Some(10), Some(2), None).await;
    assert!(matches!(duplicate, Err(SiteloreError::JobExists(_))));

    registry.stop(first.site_id()).await.unwrap();
    assert_eq!(first.wait_settled().await, CrawlState::Stopped);

    let progress = registry.progress(first.site_id()).await.unwrap();
    assert_eq!(progress.state, CrawlState::Stopped);
    assert_eq!(progress.visited_count, 0);
    assert_eq!(progress.remaining_count, 0);
    assert_eq!(stores.store(first.site_id()).unwrap().close_calls(), 1);

    let second = registry
        .start(&server.uri(), Some(10), Some(2), None)
        .await
        .expect("a stopped job can be replaced");
    assert_eq!(second.wait_settled().await, CrawlState::Completed);
    assert_eq!(second.progress().visited_count, 1);

    registry.shutdown().await;
    assert_eq!(registry.statuses().await.len(), 1);
}

#[tokio::test]
async fn test_crawl_persists_to_sqlite() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("sitelore.db");

    mount_robots(&server, 200, "User-agent: *\nAllow: /").await;
    mount_page(
        &server,
        "/",
        html_page("Home", "Start with the installation guide", &["/install"]),
    )
    .await;
    mount_page(
        &server,
        "/install",
        html_page("Install", "Install the toolchain with rustup", &[]),
    )
    .await;

    let mut config = test_config();
    config.store.database_path = db_path.to_string_lossy().to_string();
    let stores = Arc::new(SqliteStoreProvider::new(&db_path, 1000, 200));
    let registry = JobRegistry::new(
        config,
        Arc::new(HttpRenderer::new(Duration::from_secs(5))),
        stores,
    );

    let job = registry
        .start(&server.uri(), Some(10), Some(2), None)
        .await
        .unwrap();
    assert_eq!(job.wait_settled().await, CrawlState::Completed);
    registry.shutdown().await;

    let store = SqliteDocumentStore::open(&db_path, job.site_id(), 1000, 200).unwrap();
    assert_eq!(store.document_count().unwrap(), 2);

    let hits = store.search("rustup toolchain", 5, None).await.unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].title, "Install");
    assert!(hits[0].url.ends_with("/install"));
}
