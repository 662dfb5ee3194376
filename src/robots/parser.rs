//! Robots.txt parser implementation
//!
//! This module wraps the robotstxt crate's matcher and adds crawl-delay
//! lookup, which the matcher does not expose.

use robotstxt::DefaultMatcher;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

#[derive(Debug, Clone)]
enum Directives {
    /// No usable robots.txt (missing, unreachable, unreadable)
    AllowAll,
    /// Access to robots.txt itself was refused
    DisallowAll,
    /// Raw robots.txt body, evaluated on demand
    Rules(String),
}

/// Parsed robots.txt data
///
/// The ruleset is fetched once per crawl job and consulted for every URL the
/// job wants to fetch.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    directives: Directives,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        if content.trim().is_empty() {
            return Self::allow_all();
        }
        Self {
            directives: Directives::Rules(content.to_string()),
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// This is used when robots.txt cannot be fetched or parsed.
    pub fn allow_all() -> Self {
        Self {
            directives: Directives::AllowAll,
        }
    }

    /// Creates a ParsedRobots that refuses every URL
    pub fn disallow_all() -> Self {
        Self {
            directives: Directives::DisallowAll,
        }
    }

    /// Returns true if no directives are in effect
    pub fn is_permissive(&self) -> bool {
        matches!(self.directives, Directives::AllowAll)
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// `user_agent` is matched against `User-agent` lines as a product token
    /// (see [`product_token`]). Any failure inside the matcher counts as
    /// "not allowed".
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match &self.directives {
            Directives::AllowAll => true,
            Directives::DisallowAll => false,
            Directives::Rules(content) => {
                let agent = product_token(user_agent);
                guarded_verdict(url, || {
                    let mut matcher = DefaultMatcher::default();
                    matcher.one_agent_allowed_by_robots(content, agent, url)
                })
            }
        }
    }

    /// Gets the crawl delay in seconds for a specific user agent
    ///
    /// A group naming the agent takes precedence over the `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        let content = match &self.directives {
            Directives::Rules(content) => content,
            _ => return None,
        };

        let agent = product_token(user_agent).to_lowercase();

        let mut group_agents: Vec<String> = Vec::new();
        let mut group_has_rules = false;
        let mut delay_for_agent: Option<f64> = None;
        let mut delay_for_wildcard: Option<f64> = None;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // A user-agent line after rules opens a new group
                    if group_has_rules {
                        group_agents.clear();
                        group_has_rules = false;
                    }
                    group_agents.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    group_has_rules = true;
                    let Ok(delay) = value.parse::<f64>() else {
                        continue;
                    };
                    if !delay.is_finite() || delay < 0.0 {
                        continue;
                    }
                    if group_agents.iter().any(|ua| *ua == agent) {
                        delay_for_agent.get_or_insert(delay);
                    } else if group_agents.iter().any(|ua| ua == "*") {
                        delay_for_wildcard.get_or_insert(delay);
                    }
                }
                _ => group_has_rules = true,
            }
        }

        delay_for_agent.or(delay_for_wildcard)
    }
}

/// Reduces a full user agent string to the token robots.txt groups name
///
/// `Mozilla/5.0 (compatible; RAGSearchBot/1.0;)` becomes `RAGSearchBot`;
/// `TestBot/2.1` becomes `TestBot`.
pub fn product_token(user_agent: &str) -> &str {
    let user_agent = user_agent.trim();
    let source = match user_agent.find("compatible;") {
        Some(idx) => user_agent[idx + "compatible;".len()..].trim_start(),
        None => user_agent,
    };
    let end = source
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(source.len());
    if end == 0 {
        user_agent
    } else {
        &source[..end]
    }
}

/// Runs a matcher check, answering "not allowed" if it panics
fn guarded_verdict(url: &str, check: impl FnOnce() -> bool) -> bool {
    match catch_unwind(AssertUnwindSafe(check)) {
        Ok(allowed) => allowed,
        Err(_) => {
            warn!("robots.txt evaluation failed for {}, treating as disallowed", url);
            false
        }
    }
}
