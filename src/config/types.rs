use serde::Deserialize;

/// User agent sent with every request when none is configured
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; RAGSearchBot/1.0;)";

/// Page budget for one crawl run
pub const DEFAULT_MAX_PAGES: usize = 200;

/// Number of pages fetched concurrently
pub const DEFAULT_CONCURRENCY: usize = 25;

/// Politeness delay used when robots.txt does not set a crawl delay (milliseconds)
pub const DEFAULT_CRAWL_DELAY_MS: u64 = 2000;

/// Per-request timeout (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Interval between progress log lines while a crawl runs (seconds)
pub const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 30;

/// Characters per stored chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Characters shared between consecutive chunks
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Main configuration structure for Sitelore
///
/// Every section is optional in the TOML file; missing sections and fields
/// take the documented defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// User agent for page and robots.txt requests
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Maximum number of pages visited per run
    #[serde(rename = "max-pages")]
    pub max_pages: usize,

    /// Maximum number of concurrent page fetches
    #[serde(rename = "concurrency")]
    pub concurrency: usize,

    /// Delay after each page fetch when robots.txt sets none (milliseconds)
    #[serde(rename = "crawl-delay-ms")]
    pub crawl_delay_ms: u64,

    /// Ignore robots.txt directives entirely
    #[serde(rename = "override-robots")]
    pub override_robots: bool,

    /// Timeout applied to every HTTP request (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Interval between progress reports (seconds)
    #[serde(rename = "progress-interval-secs")]
    pub progress_interval_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_pages: DEFAULT_MAX_PAGES,
            concurrency: DEFAULT_CONCURRENCY,
            crawl_delay_ms: DEFAULT_CRAWL_DELAY_MS,
            override_robots: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            progress_interval_secs: DEFAULT_PROGRESS_INTERVAL_SECS,
        }
    }
}

/// Main-content extraction configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Selectors tried in order for the main article/content container
    #[serde(rename = "main-selectors")]
    pub main_selectors: Vec<String>,

    /// Regions removed from the body when no main container matches
    #[serde(rename = "excluded-selectors")]
    pub excluded_selectors: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            main_selectors: [
                "main[id*='article']",
                "main[id*='content']",
                "main[class*='article']",
                "main[class*='content']",
                "[role='main']",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            excluded_selectors: [
                "nav",
                "header",
                "footer",
                "#footer",
                "#header",
                ".navigation",
                ".menu",
                ".sidebar",
                "script",
                "style",
                "noscript",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Document store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Characters per chunk
    #[serde(rename = "chunk-size")]
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[serde(rename = "chunk-overlap")]
    pub chunk_overlap: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: "./sitelore.db".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}
