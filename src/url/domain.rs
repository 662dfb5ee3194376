use crate::{UrlError, UrlResult};
use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host, it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitelore::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Derives the site identifier for a base URL or bare host
///
/// The site identifier is the lowercase host. It keys crawl jobs and names
/// the document store collection for the site. Inputs without a scheme are
/// treated as bare hosts.
///
/// # Examples
///
/// ```
/// use sitelore::url::site_id;
///
/// assert_eq!(site_id("https://Docs.Example.com/guide").unwrap(), "docs.example.com");
/// assert_eq!(site_id("example.com").unwrap(), "example.com");
/// ```
pub fn site_id(input: &str) -> UrlResult<String> {
    let input = input.trim();
    let url = if input.contains("://") {
        Url::parse(input).map_err(|e| UrlError::Parse(e.to_string()))?
    } else {
        Url::parse(&format!("https://{}", input)).map_err(|e| UrlError::Parse(e.to_string()))?
    };
    extract_domain(&url).ok_or(UrlError::MissingDomain)
}
