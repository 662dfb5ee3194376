//! URL handling module for Sitelore
//!
//! This module provides host extraction, site identifiers and the same-site
//! scope used to filter discovered links.

mod domain;
mod scope;

pub use domain::{extract_domain, site_id};
pub use scope::SiteScope;
