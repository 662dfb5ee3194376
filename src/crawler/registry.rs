//! Job registry - at most one crawl job per site
//!
//! The registry owns every [`CrawlJob`] keyed by site id, spawns each run on
//! the tokio runtime and exposes start / stop / progress by site.

use crate::config::Config;
use crate::crawler::coordinator::{CrawlJob, JobOptions, Progress};
use crate::render::Renderer;
use crate::state::CrawlState;
use crate::storage::StoreProvider;
use crate::url::{site_id, SiteScope};
use crate::{ConfigError, Result, SiteloreError};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

struct JobEntry {
    job: CrawlJob,
    task: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Jobs {
    entries: HashMap<String, JobEntry>,
    /// Sites whose job is still being created
    pending: HashSet<String>,
}

/// Claim on a site while its job is created outside the lock
///
/// Dropping it frees the site again, including when `start` is cancelled.
struct Reservation<'a> {
    jobs: &'a Mutex<Jobs>,
    site: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.pending.remove(&self.site);
    }
}

/// Owner of all crawl jobs of the process
pub struct JobRegistry {
    config: Config,
    renderer: Arc<dyn Renderer>,
    stores: Arc<dyn StoreProvider>,
    jobs: Mutex<Jobs>,
}

impl JobRegistry {
    pub fn new(config: Config, renderer: Arc<dyn Renderer>, stores: Arc<dyn StoreProvider>) -> Self {
        Self {
            config,
            renderer,
            stores,
            jobs: Mutex::new(Jobs::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Jobs> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reserve(&self, site: &str) -> Result<Reservation<'_>> {
        let mut jobs = self.lock();
        let active = jobs
            .entries
            .get(site)
            .is_some_and(|entry| entry.job.state() != CrawlState::Stopped);
        if active || !jobs.pending.insert(site.to_string()) {
            return Err(SiteloreError::JobExists(site.to_string()));
        }
        Ok(Reservation {
            jobs: &self.jobs,
            site: site.to_string(),
        })
    }

    /// Creates a job for the site of `base_url` and starts its first run
    ///
    /// `None` arguments fall back to the configured values.
    ///
    /// # Errors
    ///
    /// * `JobExists` if a job for the site is registered and not stopped
    /// * `Config` if `max_pages` or `concurrency` is zero
    /// * URL and storage errors from creating the job
    pub async fn start(
        &self,
        base_url: &str,
        max_pages: Option<usize>,
        concurrency: Option<usize>,
        override_robots: Option<bool>,
    ) -> Result<CrawlJob> {
        let scope = SiteScope::new(base_url)?;
        let site = scope.site_id().to_string();

        let mut options = JobOptions::from_config(&self.config, base_url)?;
        if let Some(max_pages) = max_pages {
            options.max_pages = max_pages;
        }
        if let Some(concurrency) = concurrency {
            options.concurrency = concurrency;
        }
        if let Some(override_robots) = override_robots {
            options.override_robots = override_robots;
        }
        if options.max_pages == 0 {
            return Err(ConfigError::Validation("max_pages must be at least 1".into()).into());
        }
        if options.concurrency == 0 {
            return Err(ConfigError::Validation("concurrency must be at least 1".into()).into());
        }

        // The robots fetch runs unlocked; the reservation keeps a second
        // start for the same site out meanwhile.
        let reservation = self.reserve(&site)?;
        let store = self.stores.open(&site)?;
        let job = CrawlJob::create(options, Arc::clone(&self.renderer), store).await?;

        let runner = job.clone();
        let max_pages = job.options().max_pages;
        let task = tokio::spawn(async move {
            if let Err(e) = runner.run(max_pages).await {
                tracing::error!("Crawl for {} failed: {}", runner.site_id(), e);
            }
        });

        tracing::info!("Registered crawl job for {}", site);
        self.lock().entries.insert(
            site,
            JobEntry {
                job: job.clone(),
                task: Some(task),
            },
        );
        drop(reservation);
        Ok(job)
    }

    /// The job registered for a site, if any
    ///
    /// Accepts a site id or any URL of the site.
    pub async fn job(&self, site: &str) -> Option<CrawlJob> {
        let key = registry_key(site);
        self.lock().entries.get(&key).map(|e| e.job.clone())
    }

    pub async fn stop(&self, site: &str) -> Result<()> {
        let job = self
            .job(site)
            .await
            .ok_or_else(|| SiteloreError::UnknownJob(site.to_string()))?;
        job.stop().await;
        Ok(())
    }

    pub async fn progress(&self, site: &str) -> Result<Progress> {
        self.job(site)
            .await
            .map(|job| job.progress())
            .ok_or_else(|| SiteloreError::UnknownJob(site.to_string()))
    }

    /// Progress of every registered job, ordered by site id
    pub async fn statuses(&self) -> Vec<Progress> {
        let mut statuses: Vec<Progress> = self
            .lock()
            .entries
            .values()
            .map(|e| e.job.progress())
            .collect();
        statuses.sort_by(|a, b| a.site_id.cmp(&b.site_id));
        statuses
    }

    /// Waits for every spawned run to return
    pub async fn join_all(&self) {
        let tasks: Vec<JoinHandle<()>> = self
            .lock()
            .entries
            .values_mut()
            .filter_map(|e| e.task.take())
            .collect();

        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!("Crawl task panicked: {}", e);
            }
        }
    }

    /// Stops every job and waits for their runs to return
    pub async fn shutdown(&self) {
        let jobs: Vec<CrawlJob> = self
            .lock()
            .entries
            .values()
            .map(|e| e.job.clone())
            .collect();

        for job in &jobs {
            job.stop().await;
        }
        self.join_all().await;
        tracing::info!("Registry shut down ({} jobs)", jobs.len());
    }
}

/// Site id for a bare site id or a URL
fn registry_key(site: &str) -> String {
    if site.contains("://") {
        site_id(site).unwrap_or_else(|_| site.to_string())
    } else {
        site.to_string()
    }
}
