//! State module for crawl jobs
//!
//! # Components
//!
//! - `CrawlState`: lifecycle of a crawl job (idle, running, completed, stopped, failed)
//! - `PageOutcome`: what happened to one URL inside a run

mod crawl_state;
mod page_outcome;

pub use crawl_state::CrawlState;
pub use page_outcome::PageOutcome;
