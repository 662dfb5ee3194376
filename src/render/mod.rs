//! Page rendering collaborators
//!
//! The crawler never talks to the network for pages directly. It launches a
//! [`Renderer`] once per run, opens one [`PageHandle`] per URL from the shared
//! [`RenderContext`], and closes the context exactly once at teardown.
//!
//! [`HttpRenderer`] is the default implementation: a plain HTTP client that
//! returns the served HTML without executing scripts.

mod http;

pub use http::{build_http_client, HttpRenderer};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by rendering collaborators
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to launch renderer: {0}")]
    Launch(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Unsupported content type: {content_type}")]
    ContentMismatch { content_type: String },

    #[error("Failed to read page body: {0}")]
    Body(String),

    #[error("Render context is closed")]
    Closed,

    #[error("No page loaded")]
    NotLoaded,
}

/// Response metadata returned by [`PageHandle::goto`]
#[derive(Debug, Clone, Default)]
pub struct ResponseMeta {
    pub status: u16,
    /// URL after redirects
    pub final_url: String,
    /// Header map with lower-cased names
    pub headers: HashMap<String, String>,
}

impl ResponseMeta {
    pub fn new(status: u16, final_url: impl Into<String>) -> Self {
        Self {
            status,
            final_url: final_url.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.header("last-modified")
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// Launches rendering contexts
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn launch(&self, user_agent: &str) -> Result<Arc<dyn RenderContext>, RenderError>;
}

/// A launched rendering engine shared by all units of one run
#[async_trait]
pub trait RenderContext: Send + Sync {
    async fn open_page(&self) -> Result<Box<dyn PageHandle>, RenderError>;

    /// Releases the context; later `open_page` calls fail
    async fn close(&self);
}

/// One page, owned by a single unit of work
#[async_trait]
pub trait PageHandle: Send + Sync {
    async fn goto(&mut self, url: &str) -> Result<ResponseMeta, RenderError>;

    /// The loaded document's HTML
    async fn html(&self) -> Result<String, RenderError>;

    async fn close(&mut self);
}
