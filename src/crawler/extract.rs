//! Main-content extraction
//!
//! Turns a fetched page into an [`ExtractedDocument`]: title, main text,
//! SHA-256 content hash and the `Last-Modified` header.
//!
//! Text comes from the first element matching one of the main-content
//! selectors. Pages without such a container fall back to the whole body
//! with navigation, headers, footers, menus and sidebars left out.

use crate::config::ExtractionConfig;
use crate::render::{RenderError, ResponseMeta};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised while extracting page content
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    #[error("Page content unavailable: {0}")]
    Page(#[from] RenderError),

    #[error("No text content found at {url}")]
    NoContent { url: String },
}

/// A normalized page, ready for the document store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedDocument {
    pub url: String,
    pub title: String,
    pub content: String,
    /// Hex SHA-256 of `content`
    pub content_hash: String,
    pub last_modified: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

/// Computes the hex-encoded SHA-256 digest of a text
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Elements whose text is never part of the rendered page
const INVISIBLE_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Two-tier main-content extractor
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    main: Option<Selector>,
    excluded: Vec<Selector>,
}

impl ContentExtractor {
    /// Creates an extractor from CSS selector strings
    ///
    /// The main selectors are combined into one selector list so the first
    /// match in document order wins, whichever selector it matched.
    pub fn new(main_selectors: &[String], excluded_selectors: &[String]) -> Result<Self, ExtractError> {
        let main = if main_selectors.is_empty() {
            None
        } else {
            Some(parse_selector(&main_selectors.join(", "))?)
        };

        let excluded = excluded_selectors
            .iter()
            .map(|s| parse_selector(s))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { main, excluded })
    }

    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        Self::new(&config.main_selectors, &config.excluded_selectors)
    }

    /// Extracts a document from a page's HTML and response metadata
    ///
    /// # Errors
    ///
    /// * `NoContent` if neither the main container nor the body yields text
    pub fn extract(&self, html: &str, meta: &ResponseMeta) -> Result<ExtractedDocument, ExtractError> {
        let document = Html::parse_document(html);

        let title = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "title")
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let content = self.main_text(&document);
        if content.is_empty() {
            return Err(ExtractError::NoContent {
                url: meta.final_url.clone(),
            });
        }

        Ok(ExtractedDocument {
            url: meta.final_url.clone(),
            title,
            content_hash: content_hash(&content),
            content,
            last_modified: meta.last_modified().map(str::to_string),
            scraped_at: Utc::now(),
        })
    }

    fn main_text(&self, document: &Html) -> String {
        let mut skipped = HashSet::new();

        let root = match self.main.as_ref().and_then(|sel| document.select(sel).next()) {
            Some(main) => main,
            None => {
                for selector in &self.excluded {
                    for el in document.select(selector) {
                        skipped.insert(el.id());
                    }
                }
                let body = document
                    .root_element()
                    .children()
                    .filter_map(ElementRef::wrap)
                    .find(|el| el.value().name() == "body");
                match body {
                    Some(body) => body,
                    None => return String::new(),
                }
            }
        };

        let mut parts: Vec<&str> = Vec::new();
        for node in root.descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let hidden = node.ancestors().any(|a| {
                skipped.contains(&a.id())
                    || a
                        .value()
                        .as_element()
                        .is_some_and(|e| INVISIBLE_ELEMENTS.contains(&e.name()))
            });
            if hidden {
                continue;
            }
            let text = text.trim();
            if !text.is_empty() {
                parts.push(text);
            }
        }

        parts.join("\n")
    }
}

impl Default for ContentExtractor {
    fn default() -> Self {
        let config = ExtractionConfig::default();
        Self {
            main: Selector::parse(&config.main_selectors.join(", ")).ok(),
            excluded: config
                .excluded_selectors
                .iter()
                .filter_map(|s| Selector::parse(s).ok())
                .collect(),
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::Selector {
        selector: selector.to_string(),
        reason: format!("{:?}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ResponseMeta {
        ResponseMeta::new(200, "https://site.com/page")
            .with_header("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT")
    }

    #[test]
    fn test_content_hash_is_deterministic() {
        assert_eq!(content_hash("hello world"), content_hash("hello world"));
        assert_ne!(content_hash("hello world"), content_hash("hello world!"));
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_main_container_wins() {
        let html = r#"<html><head><title> Guide </title></head><body>
            <nav>Home | About</nav>
            <main class="page-content"><h1>Install</h1><p>Run the installer.</p></main>
            <footer>Copyright</footer>
        </body></html>"#;

        let doc = ContentExtractor::default().extract(html, &meta()).unwrap();
        assert_eq!(doc.title, "Guide");
        assert_eq!(doc.content, "Install\nRun the installer.");
        assert_eq!(doc.url, "https://site.com/page");
        assert_eq!(doc.content_hash, content_hash(&doc.content));
        assert_eq!(
            doc.last_modified.as_deref(),
            Some("Wed, 21 Oct 2015 07:28:00 GMT")
        );
    }

    #[test]
    fn test_role_main() {
        let html = r#"<body><div role="main">Body text</div><aside>Other</aside></body>"#;
        let doc = ContentExtractor::default().extract(html, &meta()).unwrap();
        assert_eq!(doc.content, "Body text");
    }

    #[test]
    fn test_body_fallback_removes_chrome() {
        let html = r#"<html><body>
            <header>Site header</header>
            <div class="menu">Menu</div>
            <div id="wrapper">
              <p>First paragraph.</p>
              <div class="sidebar"><p>Related</p></div>
              <p>Second paragraph.</p>
              <script>var x = 1;</script>
            </div>
            <div id="footer">Footer</div>
        </body></html>"#;

        let doc = ContentExtractor::default().extract(html, &meta()).unwrap();
        assert_eq!(doc.content, "First paragraph.\nSecond paragraph.");
        assert_eq!(doc.title, "");
        assert_eq!(doc.last_modified.as_deref(), Some("Wed, 21 Oct 2015 07:28:00 GMT"));
    }

    #[test]
    fn test_missing_last_modified() {
        let html = "<p>text</p>";
        let doc = ContentExtractor::default().extract(html, &ResponseMeta::new(200, "https://site.com/")).unwrap();
        assert_eq!(doc.last_modified, None);
        assert_eq!(doc.content, "text");
    }

    #[test]
    fn test_custom_selectors() {
        let extractor =
            ContentExtractor::new(&["article".to_string()], &[".ad".to_string()]).unwrap();
        let html = r#"<body><p class="ad">Buy now</p><p>Intro</p><article>Story</article></body>"#;
        assert_eq!(extractor.extract(html, &meta()).unwrap().content, "Story");

        let html = r#"<body><p class="ad">Buy now</p><p>Intro</p></body>"#;
        assert_eq!(extractor.extract(html, &meta()).unwrap().content, "Intro");
    }

    #[test]
    fn test_page_without_text_fails() {
        let html = r#"<html><body><nav>Menu</nav><a href="/next"><img src="x.png"></a></body></html>"#;
        let result = ContentExtractor::default().extract(html, &meta());
        assert!(matches!(result, Err(ExtractError::NoContent { url }) if url == "https://site.com/page"));

        let result = ContentExtractor::default().extract("<html><head></head></html>", &meta());
        assert!(matches!(result, Err(ExtractError::NoContent { .. })));
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let result = ContentExtractor::new(&["main[[".to_string()], &[]);
        assert!(matches!(result, Err(ExtractError::Selector { .. })));
    }

    #[test]
    fn test_default_matches_config_defaults() {
        let from_config = ContentExtractor::from_config(&ExtractionConfig::default()).unwrap();
        let html = r#"<body><nav>x</nav><main id="content">y</main></body>"#;
        assert_eq!(
            from_config.extract(html, &meta()).unwrap().content,
            ContentExtractor::default().extract(html, &meta()).unwrap().content
        );
    }
}
