use crate::robots::{fetch_robots, ParsedRobots};
use crate::url::SiteScope;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Per-job fetch policy
///
/// Decides whether a URL may be fetched, based on the job's override flag,
/// the site scope and the robots.txt ruleset fetched when the job was
/// created. The ruleset is never refreshed during the job's lifetime.
#[derive(Debug, Clone)]
pub struct PolicyGuard {
    scope: SiteScope,
    robots: ParsedRobots,
    user_agent: String,
    override_robots: bool,
    fetched_at: DateTime<Utc>,
}

impl PolicyGuard {
    pub fn new(
        scope: SiteScope,
        robots: ParsedRobots,
        user_agent: impl Into<String>,
        override_robots: bool,
    ) -> Self {
        Self {
            scope,
            robots,
            user_agent: user_agent.into(),
            override_robots,
            fetched_at: Utc::now(),
        }
    }

    /// Builds a guard by fetching the site's robots.txt once
    ///
    /// Never fails: an unreachable or unreadable robots.txt yields a
    /// permissive ruleset. With `override_robots` set the file is not
    /// requested at all.
    pub async fn fetch(
        client: &Client,
        scope: SiteScope,
        user_agent: &str,
        override_robots: bool,
    ) -> Self {
        let robots = if override_robots {
            info!("robots.txt overridden for {}", scope.site_id());
            ParsedRobots::allow_all()
        } else {
            match scope.robots_url() {
                Ok(robots_url) => fetch_robots(client, &robots_url).await,
                Err(_) => ParsedRobots::allow_all(),
            }
        };
        Self::new(scope, robots, user_agent, override_robots)
    }

    /// Returns true if `url` may be fetched
    ///
    /// The override flag allows everything. Otherwise the URL must belong to
    /// the job's host and pass the robots ruleset.
    pub fn may_fetch(&self, url: &str) -> bool {
        if self.override_robots {
            return true;
        }

        if !self.scope.same_host(url) {
            debug!("Off-site URL refused: {}", url);
            return false;
        }

        let allowed = self.robots.is_allowed(url, &self.user_agent);
        if !allowed {
            debug!("Disallowed by robots.txt: {}", url);
        }
        allowed
    }

    /// Crawl delay requested by robots.txt for the given agent, if any
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.robots
            .crawl_delay(user_agent)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    pub fn scope(&self) -> &SiteScope {
        &self.scope
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn override_robots(&self) -> bool {
        self.override_robots
    }

    /// When the robots ruleset was obtained
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UA: &str = "Mozilla/5.0 (compatible; TestBot/1.0;)";

    fn guard(content: &str, override_robots: bool) -> PolicyGuard {
        PolicyGuard::new(
            SiteScope::new("https://site.com").unwrap(),
            ParsedRobots::from_content(content),
            UA,
            override_robots,
        )
    }

    #[test]
    fn test_disallowed_path() {
        let guard = guard("User-agent: *\nDisallow: /private", false);
        assert!(!guard.may_fetch("https://site.com/private"));
        assert!(guard.may_fetch("https://site.com/public"));
    }

    #[test]
    fn test_override_allows_everything() {
        let guard = guard("User-agent: *\nDisallow: /", true);
        assert!(guard.may_fetch("https://site.com/private"));
        assert!(guard.may_fetch("https://site.com/"));
        assert!(guard.may_fetch("https://other.com/anything"));
    }

    #[test]
    fn test_off_site_refused() {
        let guard = guard("", false);
        assert!(!guard.may_fetch("https://other.com/page"));
        assert!(!guard.may_fetch("not a url"));
    }

    #[test]
    fn test_access_restricted_robots_fail_closed() {
        let guard = PolicyGuard::new(
            SiteScope::new("https://site.com").unwrap(),
            ParsedRobots::disallow_all(),
            UA,
            false,
        );
        assert!(!guard.may_fetch("https://site.com/"));
    }

    #[test]
    fn test_crawl_delay() {
        let guard = guard("User-agent: *\nCrawl-delay: 1.5", false);
        assert_eq!(guard.crawl_delay(UA), Some(Duration::from_millis(1500)));

        let guard = self::guard("User-agent: *\nDisallow: /x", false);
        assert_eq!(guard.crawl_delay(UA), None);
    }
}
