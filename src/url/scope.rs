use crate::url::extract_domain;
use crate::{UrlError, UrlResult};
use url::Url;

/// The same-site boundary of one crawl job
///
/// A scope is built from the job's base URL. It decides which hrefs found on
/// a page belong to the site and turns them into absolute URLs:
///
/// - absolute hrefs that start with the base URL are kept
/// - root-relative hrefs (`/path`) are resolved against the base URL
/// - everything else (other hosts, relative paths, fragments, `javascript:`,
///   `mailto:` and other schemes) is dropped
///
/// Every URL a scope hands out is in canonical form: parsed, serialized by
/// the `url` crate and stripped of its fragment. `https://site.com`,
/// `https://site.com/` and `https://site.com/#top` are one page.
#[derive(Debug, Clone)]
pub struct SiteScope {
    base: Url,
    prefix: String,
    host: String,
}

impl SiteScope {
    /// Creates a scope for the given base URL
    ///
    /// # Errors
    ///
    /// Fails if the URL does not parse, is not HTTP(S), or has no host.
    pub fn new(base_url: &str) -> UrlResult<Self> {
        let mut base = Url::parse(base_url.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
        base.set_fragment(None);

        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(UrlError::InvalidScheme(format!(
                "Only HTTP and HTTPS schemes are supported, got: {}",
                base.scheme()
            )));
        }

        let host = extract_domain(&base).ok_or(UrlError::MissingDomain)?;
        let prefix = base.as_str().trim_end_matches('/').to_string();

        Ok(Self { base, prefix, host })
    }

    /// The site identifier (lowercase host)
    pub fn site_id(&self) -> &str {
        &self.host
    }

    /// The parsed base URL
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// The base URL without trailing slashes, used for prefix matching
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The URL the frontier is seeded with
    pub fn seed_url(&self) -> String {
        self.base.to_string()
    }

    /// Location of the site's robots.txt
    pub fn robots_url(&self) -> UrlResult<Url> {
        self.base
            .join("/robots.txt")
            .map_err(|e| UrlError::Parse(e.to_string()))
    }

    /// Resolves an href into a same-site absolute URL
    ///
    /// Returns `None` for every href outside the scope.
    pub fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }

        let root_relative = href.starts_with('/');
        // Protocol-relative hrefs ("//host/path") also start with '/'
        let resolved = if root_relative {
            self.base.join(href).ok()?
        } else {
            Url::parse(href).ok()?
        };
        if !self.is_same_origin(&resolved) {
            return None;
        }

        let url = canonical(resolved);
        if root_relative || self.within_prefix(&url) {
            Some(url)
        } else {
            None
        }
    }

    /// True if `url` extends the base URL at a path boundary
    ///
    /// "https://site.com/docs-old" is not under "https://site.com/docs".
    fn within_prefix(&self, url: &str) -> bool {
        url.strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?']))
    }

    /// Returns true if the URL points at the same scheme, host and port
    pub fn same_host(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|u| self.is_same_origin(&u))
            .unwrap_or(false)
    }

    fn is_same_origin(&self, url: &Url) -> bool {
        url.scheme() == self.base.scheme()
            && extract_domain(url).as_deref() == Some(self.host.as_str())
            && url.port_or_known_default() == self.base.port_or_known_default()
    }
}

/// Serializes a URL without its fragment
fn canonical(mut url: Url) -> String {
    url.set_fragment(None);
    url.into()
}
