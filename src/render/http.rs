//! HTTP-only renderer
//!
//! Fetches pages with reqwest. Redirects are followed by the client and the
//! body is kept on the page handle until it is closed.

use super::{PageHandle, RenderContext, RenderError, Renderer, ResponseMeta};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use sitelore::render::build_http_client;
///
/// let client = build_http_client(
///     "Mozilla/5.0 (compatible; RAGSearchBot/1.0;)",
///     Duration::from_secs(30),
/// ).unwrap();
/// ```
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Renderer backed by a plain HTTP client
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    timeout: Duration,
}

impl HttpRenderer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpRenderer {
    fn default() -> Self {
        Self::new(Duration::from_secs(crate::config::DEFAULT_REQUEST_TIMEOUT_SECS))
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn launch(&self, user_agent: &str) -> Result<Arc<dyn RenderContext>, RenderError> {
        let client = build_http_client(user_agent, self.timeout)
            .map_err(|e| RenderError::Launch(e.to_string()))?;
        debug!("HTTP render context created with user agent: {}", user_agent);
        Ok(Arc::new(HttpContext {
            client,
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct HttpContext {
    client: Client,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl RenderContext for HttpContext {
    async fn open_page(&self) -> Result<Box<dyn PageHandle>, RenderError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RenderError::Closed);
        }
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            closed: Arc::clone(&self.closed),
            body: None,
        }))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

struct HttpPage {
    client: Client,
    closed: Arc<AtomicBool>,
    body: Option<String>,
}

#[async_trait]
impl PageHandle for HttpPage {
    async fn goto(&mut self, url: &str) -> Result<ResponseMeta, RenderError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RenderError::Closed);
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(RenderError::Status {
                url: final_url,
                status: status.as_u16(),
            });
        }

        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        // A missing Content-Type is accepted
        if let Some(content_type) = headers.get("content-type") {
            if !is_markup(content_type) {
                return Err(RenderError::ContentMismatch {
                    content_type: content_type.clone(),
                });
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| RenderError::Body(e.to_string()))?;
        self.body = Some(body);

        Ok(ResponseMeta {
            status: status.as_u16(),
            final_url,
            headers,
        })
    }

    async fn html(&self) -> Result<String, RenderError> {
        self.body.clone().ok_or(RenderError::NotLoaded)
    }

    async fn close(&mut self) {
        self.body = None;
    }
}

fn is_markup(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.starts_with("text/") || mime == "application/xhtml+xml"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client("TestBot/1.0", Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[test]
    fn test_is_markup() {
        assert!(is_markup("text/html; charset=utf-8"));
        assert!(is_markup("TEXT/HTML"));
        assert!(is_markup("application/xhtml+xml"));
        assert!(!is_markup("application/pdf"));
        assert!(!is_markup("image/png"));
    }

    #[tokio::test]
    async fn test_closed_context_refuses_pages() {
        let context = HttpRenderer::default().launch("TestBot/1.0").await.unwrap();
        let mut page = context.open_page().await.unwrap();
        assert!(matches!(page.html().await, Err(RenderError::NotLoaded)));

        context.close().await;
        assert!(matches!(context.open_page().await, Err(RenderError::Closed)));
        assert!(matches!(
            page.goto("https://site.com/").await,
            Err(RenderError::Closed)
        ));
    }
}
