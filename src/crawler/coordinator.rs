//! Crawl job - the per-site crawl orchestration
//!
//! A [`CrawlJob`] owns everything one site's crawl needs: the policy guard,
//! the frontier, the admission gate, the document store and the lifecycle
//! state. A run proceeds batch by batch:
//!
//! 1. drain up to `concurrency` URLs from the frontier
//! 2. spawn one fetch-extract-discover unit per URL, each waiting for a
//!    permit from the shared semaphore
//! 3. wait for every unit of the batch before draining the next one
//!
//! Units never propagate failures. Each returns a [`PageOutcome`] that the
//! run tallies into its [`RunSummary`].

use crate::config::{Config, DEFAULT_CRAWL_DELAY_MS, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::crawler::extract::{ContentExtractor, ExtractError};
use crate::crawler::frontier::Frontier;
use crate::crawler::parser::extract_links;
use crate::render::{build_http_client, PageHandle, RenderContext, Renderer};
use crate::robots::PolicyGuard;
use crate::state::{CrawlState, PageOutcome};
use crate::storage::DocumentStore;
use crate::url::SiteScope;
use crate::{Result, SiteloreError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Settings for one crawl job
#[derive(Debug, Clone)]
pub struct JobOptions {
    pub base_url: String,
    pub user_agent: String,
    pub max_pages: usize,
    /// Size of the admission gate and of each batch
    pub concurrency: usize,
    /// Politeness delay used when robots.txt names none
    pub default_crawl_delay: Duration,
    pub override_robots: bool,
    /// Timeout for the robots.txt request
    pub request_timeout: Duration,
    pub extractor: ContentExtractor,
}

impl JobOptions {
    /// Options with every value at its default
    pub fn new(base_url: impl Into<String>) -> Self {
        let config = Config::default();
        Self {
            base_url: base_url.into(),
            user_agent: config.crawler.user_agent,
            max_pages: config.crawler.max_pages,
            concurrency: config.crawler.concurrency,
            default_crawl_delay: Duration::from_millis(DEFAULT_CRAWL_DELAY_MS),
            override_robots: config.crawler.override_robots,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            extractor: ContentExtractor::default(),
        }
    }

    pub fn from_config(config: &Config, base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: base_url.to_string(),
            user_agent: config.crawler.user_agent.clone(),
            max_pages: config.crawler.max_pages,
            concurrency: config.crawler.concurrency,
            default_crawl_delay: Duration::from_millis(config.crawler.crawl_delay_ms),
            override_robots: config.crawler.override_robots,
            request_timeout: Duration::from_secs(config.crawler.request_timeout_secs),
            extractor: ContentExtractor::from_config(&config.extraction)?,
        })
    }
}

/// Read-only view of a job, computed on demand
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub site_id: String,
    pub state: CrawlState,
    pub visited_count: usize,
    pub remaining_count: usize,
    pub last_run_started_at: Option<DateTime<Utc>>,
}

/// Per-outcome tallies of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub indexed: usize,
    pub extract_failed: usize,
    pub disallowed: usize,
    pub fetch_failed: usize,
    pub cancelled: usize,
    /// Links newly offered to the frontier
    pub discovered: usize,
    /// Units that panicked
    pub aborted: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &PageOutcome) {
        self.discovered += outcome.discovered();
        match outcome {
            PageOutcome::Indexed { .. } => self.indexed += 1,
            PageOutcome::ExtractFailed { .. } => self.extract_failed += 1,
            PageOutcome::Disallowed => self.disallowed += 1,
            PageOutcome::FetchFailed { .. } => self.fetch_failed += 1,
            PageOutcome::Cancelled => self.cancelled += 1,
        }
    }
}

struct JobInner {
    options: JobOptions,
    scope: SiteScope,
    guard: PolicyGuard,
    extractor: Arc<ContentExtractor>,
    renderer: Arc<dyn Renderer>,
    store: Arc<dyn DocumentStore>,
    frontier: Frontier,
    gate: Arc<Semaphore>,
    state: watch::Sender<CrawlState>,
    cancel: CancellationToken,
    /// Render context of the current run; taken exactly once at teardown
    context: Mutex<Option<Arc<dyn RenderContext>>>,
}

/// Handle to one site's crawl job
///
/// Cheap to clone; all clones share the same job.
#[derive(Clone)]
pub struct CrawlJob {
    inner: Arc<JobInner>,
}

impl CrawlJob {
    /// Creates a job around an existing policy guard
    pub fn new(
        options: JobOptions,
        guard: PolicyGuard,
        renderer: Arc<dyn Renderer>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let (state, _) = watch::channel(CrawlState::Idle);
        let concurrency = options.concurrency.max(1);

        Self {
            inner: Arc::new(JobInner {
                scope: guard.scope().clone(),
                extractor: Arc::new(options.extractor.clone()),
                options,
                guard,
                renderer,
                store,
                frontier: Frontier::new(),
                gate: Arc::new(Semaphore::new(concurrency)),
                state,
                cancel: CancellationToken::new(),
                context: Mutex::new(None),
            }),
        }
    }

    /// Creates a job, fetching the site's robots.txt once
    pub async fn create(
        options: JobOptions,
        renderer: Arc<dyn Renderer>,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self> {
        let scope = SiteScope::new(&options.base_url)?;
        let client = build_http_client(&options.user_agent, options.request_timeout)?;
        let guard =
            PolicyGuard::fetch(&client, scope, &options.user_agent, options.override_robots).await;
        Ok(Self::new(options, guard, renderer, store))
    }

    pub fn site_id(&self) -> &str {
        self.inner.scope.site_id()
    }

    pub fn options(&self) -> &JobOptions {
        &self.inner.options
    }

    pub fn guard(&self) -> &PolicyGuard {
        &self.inner.guard
    }

    pub fn state(&self) -> CrawlState {
        *self.inner.state.borrow()
    }

    /// Politeness delay applied after every fetch
    ///
    /// The robots.txt crawl delay when present, else the configured default.
    pub fn crawl_delay(&self) -> Duration {
        self.inner
            .guard
            .crawl_delay(&self.inner.options.user_agent)
            .unwrap_or(self.inner.options.default_crawl_delay)
    }

    pub fn progress(&self) -> Progress {
        let frontier = &self.inner.frontier;
        Progress {
            site_id: self.site_id().to_string(),
            state: self.state(),
            visited_count: frontier.visited_count(),
            remaining_count: frontier.remaining_count(),
            last_run_started_at: frontier.run_started_at(),
        }
    }

    /// Resolves once the job is completed, stopped or failed
    pub async fn wait_settled(&self) -> CrawlState {
        let mut rx = self.inner.state.subscribe();
        let settled = match rx.wait_for(|state| state.is_settled()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        settled
    }

    fn transition(&self, to: CrawlState) -> Result<CrawlState> {
        let mut result = Err(SiteloreError::InvalidTransition { from: to, to });
        self.inner.state.send_if_modified(|current| {
            if current.can_transition_to(to) {
                result = Ok(*current);
                *current = to;
                true
            } else {
                result = Err(SiteloreError::InvalidTransition { from: *current, to });
                false
            }
        });
        result
    }

    /// Runs one crawl over the site, visiting at most `max_pages` pages
    ///
    /// # Errors
    ///
    /// * `InvalidTransition` if the job is running or stopped
    /// * `Launch` if the renderer cannot start; the job is then `Failed`
    pub async fn run(&self, max_pages: usize) -> Result<RunSummary> {
        self.transition(CrawlState::Running)?;

        let inner = &self.inner;
        inner.frontier.seed(&inner.scope.seed_url());
        tracing::info!(
            "Starting crawl for {} with max pages: {}",
            inner.options.base_url,
            max_pages
        );

        let context = match inner.renderer.launch(&inner.options.user_agent).await {
            Ok(context) => context,
            Err(e) => {
                tracing::error!("Failed to launch renderer for {}: {}", self.site_id(), e);
                inner.frontier.reset();
                // a concurrent stop already settled the job
                let _ = self.transition(CrawlState::Failed);
                return Err(SiteloreError::Launch(e));
            }
        };
        *inner.context.lock().await = Some(Arc::clone(&context));

        let delay = self.crawl_delay();
        tracing::info!("Using crawl delay: {:?}", delay);

        let mut summary = RunSummary::default();
        while !inner.cancel.is_cancelled() {
            let visited = inner.frontier.visited_count();
            if visited >= max_pages || inner.frontier.is_empty() {
                break;
            }

            let batch = inner
                .frontier
                .next_batch(inner.options.concurrency.max(1).min(max_pages - visited));
            tracing::info!(
                "URLs to crawl: {}, Visited: {}, Batch: {}",
                inner.frontier.remaining_count(),
                visited,
                batch.len()
            );

            let mut units = JoinSet::new();
            for url in batch {
                if inner.frontier.is_visited(&url) {
                    continue;
                }
                let job = self.clone();
                let context = Arc::clone(&context);
                units.spawn(async move {
                    let outcome = job.process_url(context.as_ref(), &url, delay).await;
                    (url, outcome)
                });
            }

            while let Some(joined) = units.join_next().await {
                match joined {
                    Ok((url, outcome)) => {
                        tracing::debug!("{} -> {}", url, outcome);
                        if outcome.is_retryable() {
                            tracing::debug!("{} left for a later run", url);
                        }
                        summary.record(&outcome);
                    }
                    Err(e) => {
                        tracing::error!("Crawl unit aborted: {}", e);
                        summary.aborted += 1;
                    }
                }
            }
        }

        self.release_context().await;

        if inner.cancel.is_cancelled() {
            tracing::info!("Crawl for {} ended by stop", self.site_id());
        } else if self.transition(CrawlState::Completed).is_ok() {
            tracing::info!(
                "Crawl for {} completed: {} visited, {} indexed, {} failed",
                self.site_id(),
                inner.frontier.visited_count(),
                summary.indexed,
                summary.fetch_failed + summary.extract_failed
            );
        }

        Ok(summary)
    }

    /// Stops the job
    ///
    /// Cancels in-flight units, clears the frontier and visited set, closes
    /// the document store and releases the render context. Units still
    /// running afterwards can no longer change the frontier. Calling `stop`
    /// on a stopped job does nothing.
    pub async fn stop(&self) {
        if self.transition(CrawlState::Stopped).is_err() {
            return;
        }
        tracing::info!("Stopping crawl for {}", self.site_id());

        self.inner.cancel.cancel();
        self.inner.frontier.close();
        self.inner.store.close().await;
        self.release_context().await;
    }

    async fn release_context(&self) {
        let context = self.inner.context.lock().await.take();
        if let Some(context) = context {
            context.close().await;
            tracing::debug!("Render context for {} closed", self.site_id());
        }
    }

    /// One fetch-extract-discover unit
    async fn process_url(
        &self,
        context: &dyn RenderContext,
        url: &str,
        delay: Duration,
    ) -> PageOutcome {
        let inner = &self.inner;

        let _permit = tokio::select! {
            _ = inner.cancel.cancelled() => return PageOutcome::Cancelled,
            permit = Arc::clone(&inner.gate).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return PageOutcome::Cancelled,
            },
        };

        if !inner.guard.may_fetch(url) {
            return PageOutcome::Disallowed;
        }

        tracing::info!("Crawling: {}", url);
        let mut page = match context.open_page().await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Could not open page for {}: {}", url, e);
                return PageOutcome::FetchFailed {
                    reason: e.to_string(),
                };
            }
        };

        let outcome = self.visit(page.as_mut(), url, delay).await;
        page.close().await;
        outcome
    }

    async fn visit(&self, page: &mut dyn PageHandle, url: &str, delay: Duration) -> PageOutcome {
        let inner = &self.inner;

        let meta = match page.goto(url).await {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!("Error fetching {}: {}", url, e);
                return PageOutcome::FetchFailed {
                    reason: e.to_string(),
                };
            }
        };

        tokio::select! {
            _ = inner.cancel.cancelled() => {
                tracing::info!("Cancelled the crawl of {}", url);
                return PageOutcome::Cancelled;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        inner.frontier.mark_visited(url);

        let html = match page.html().await {
            Ok(html) => html,
            Err(e) => {
                let e = ExtractError::from(e);
                tracing::warn!("Error extracting content from {}: {}", url, e);
                return PageOutcome::ExtractFailed {
                    reason: e.to_string(),
                    discovered: 0,
                };
            }
        };

        let extractor = Arc::clone(&inner.extractor);
        let scope = inner.scope.clone();
        let parsed = tokio::task::spawn_blocking(move || {
            let document = extractor.extract(&html, &meta);
            let links = extract_links(&html, &scope);
            (document, links)
        })
        .await;

        let (document, links) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Error extracting content from {}: {}", url, e);
                return PageOutcome::ExtractFailed {
                    reason: e.to_string(),
                    discovered: 0,
                };
            }
        };

        if inner.cancel.is_cancelled() {
            return PageOutcome::Cancelled;
        }

        // links are followed even when the content could not be extracted
        let discovered = links
            .iter()
            .filter(|link| inner.guard.may_fetch(link) && inner.frontier.offer(link))
            .count();

        let mut document = match document {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Error extracting content from {}: {}", url, e);
                return PageOutcome::ExtractFailed {
                    reason: e.to_string(),
                    discovered,
                };
            }
        };
        if document.url.is_empty() {
            document.url = url.to_string();
        }
        tracing::debug!(
            "Extracted content length from {}: {}",
            url,
            document.content.len()
        );

        match inner.store.store(&document).await {
            Ok(stored) => tracing::debug!("Stored {} ({:?})", document.url, stored),
            Err(e) => tracing::error!("Error storing document {}: {}", document.url, e),
        }

        PageOutcome::Indexed { discovered }
    }
}

impl std::fmt::Debug for CrawlJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlJob")
            .field("site_id", &self.site_id())
            .field("state", &self.state())
            .finish()
    }
}
