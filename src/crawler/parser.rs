//! HTML parser for extracting same-site links
//!
//! Every `<a href>` on the page is passed through the job's [`SiteScope`];
//! hrefs outside the site are dropped.

use crate::url::SiteScope;
use scraper::{Html, Selector};
use std::collections::BTreeSet;

/// Extracts the set of same-site absolute URLs linked from a page
///
/// # Rules
///
/// - absolute hrefs starting with the base URL are kept as written
/// - root-relative hrefs (`/path`) are resolved against the base URL
/// - everything else is dropped: other hosts, relative paths, fragments,
///   `javascript:` and `mailto:` links
///
/// Duplicate hrefs collapse into a single entry.
///
/// # Example
///
/// ```
/// use sitelore::crawler::extract_links;
/// use sitelore::url::SiteScope;
///
/// let scope = SiteScope::new("https://site.com").unwrap();
/// let html = r#"<a href="/docs">Docs</a><a href="https://other.com/">Out</a>"#;
/// let links = extract_links(html, &scope);
/// assert_eq!(links.into_iter().collect::<Vec<_>>(), vec!["https://site.com/docs"]);
/// ```
pub fn extract_links(html: &str, scope: &SiteScope) -> BTreeSet<String> {
    let document = Html::parse_document(html);

    let Ok(anchor) = Selector::parse("a[href]") else {
        return BTreeSet::new();
    };

    document
        .select(&anchor)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| scope.resolve(href))
        .collect()
}
