//! Configuration module for Sitelore
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every value has a default, so `Config::default()` is always usable.
//!
//! # Example
//!
//! ```no_run
//! use sitelore::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sitelore.toml")).unwrap();
//! println!("Crawler will visit at most {} pages", config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, ExtractionConfig, StoreConfig, DEFAULT_CHUNK_OVERLAP,
    DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY, DEFAULT_CRAWL_DELAY_MS, DEFAULT_MAX_PAGES,
    DEFAULT_PROGRESS_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
