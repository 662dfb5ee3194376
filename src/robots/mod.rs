//! Robots.txt handling module
//!
//! This module fetches and parses a site's robots.txt and exposes the
//! per-job fetch policy built on top of it.

mod guard;
mod parser;

pub use guard::PolicyGuard;
pub use parser::{product_token, ParsedRobots};

use reqwest::{Client, StatusCode};
use tracing::{info, warn};
use url::Url;

/// Fetches robots.txt for a site
///
/// Never fails. The outcome depends on the response:
///
/// * 2xx - the body is parsed
/// * 401 / 403 - everything is disallowed
/// * anything else, network errors, unreadable bodies - no directives
pub async fn fetch_robots(client: &Client, robots_url: &Url) -> ParsedRobots {
    let response = match client.get(robots_url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!("Could not fetch robots.txt from {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    let status = response.status();
    if status.is_success() {
        match response.text().await {
            Ok(body) => {
                info!("Successfully parsed robots.txt from {}", robots_url);
                ParsedRobots::from_content(&body)
            }
            Err(e) => {
                warn!("Could not read robots.txt body from {}: {}", robots_url, e);
                ParsedRobots::allow_all()
            }
        }
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        warn!(
            "robots.txt at {} is access restricted ({}), disallowing all",
            robots_url, status
        );
        ParsedRobots::disallow_all()
    } else {
        warn!(
            "No usable robots.txt at {} ({}), assuming no directives",
            robots_url, status
        );
        ParsedRobots::allow_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const UA: &str = "TestBot/1.0";

    async fn fetch_with(status: u16, body: &str) -> ParsedRobots {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        let robots_url = Url::parse(&format!("{}/robots.txt", server.uri())).unwrap();
        fetch_robots(&Client::new(), &robots_url).await
    }

    #[tokio::test]
    async fn test_fetch_parses_success_body() {
        let robots = fetch_with(200, "User-agent: *\nDisallow: /private").await;
        assert!(!robots.is_permissive());
        assert!(robots.is_allowed("http://site.com/public", UA));
        assert!(!robots.is_allowed("http://site.com/private/x", UA));
    }

    #[tokio::test]
    async fn test_fetch_forbidden_disallows_all() {
        let robots = fetch_with(403, "").await;
        assert!(!robots.is_allowed("http://site.com/", UA));

        let robots = fetch_with(401, "").await;
        assert!(!robots.is_allowed("http://site.com/", UA));
    }

    #[tokio::test]
    async fn test_fetch_missing_allows_all() {
        let robots = fetch_with(404, "User-agent: *\nDisallow: /").await;
        assert!(robots.is_permissive());

        let robots = fetch_with(500, "").await;
        assert!(robots.is_permissive());
    }

    #[tokio::test]
    async fn test_fetch_unreachable_allows_all() {
        // bind then release a port so nothing is listening on it
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let robots_url = Url::parse(&format!("http://127.0.0.1:{}/robots.txt", port)).unwrap();
        let robots = fetch_robots(&Client::new(), &robots_url).await;

        assert!(robots.is_permissive());
        assert!(robots.is_allowed("http://127.0.0.1/anything", UA));
    }
}
