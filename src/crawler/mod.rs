//! Crawler module for site crawling and content processing
//!
//! This module contains the core crawling logic, including:
//! - the URL frontier and dedup tracking
//! - main-content and link extraction
//! - per-site crawl jobs with bounded concurrency
//! - the registry that owns every job

mod coordinator;
mod extract;
mod frontier;
mod parser;
mod registry;

pub use coordinator::{CrawlJob, JobOptions, Progress, RunSummary};
pub use extract::{content_hash, ContentExtractor, ExtractError, ExtractedDocument};
pub use frontier::Frontier;
pub use parser::extract_links;
pub use registry::JobRegistry;
