//! URL frontier and dedup tracking for one crawl job
//!
//! All state lives behind a single mutex, so every membership check and
//! the insert that follows it happen in one critical section.

use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct FrontierState {
    /// Pending URLs, FIFO
    queue: VecDeque<String>,
    /// Mirror of `queue` for O(1) membership checks
    queued: HashSet<String>,
    /// Every URL handed out by `next_batch` in this run
    claimed: HashSet<String>,
    /// URLs fetched in this run
    visited: HashSet<String>,
    run_started_at: Option<DateTime<Utc>>,
    /// Set by `close`; cleared by `seed`
    closed: bool,
}

impl FrontierState {
    fn clear(&mut self) {
        self.queue.clear();
        self.queued.clear();
        self.claimed.clear();
        self.visited.clear();
    }
}

/// Queue of pending URLs plus the visited set
///
/// A URL is offered at most once per run: `offer` refuses URLs that are
/// queued, already handed out by `next_batch`, or visited. URLs that were
/// dequeued but not yet visited therefore stay dedup-blocking.
#[derive(Debug, Default)]
pub struct Frontier {
    inner: Mutex<FrontierState>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a new run with `url` as the only pending URL
    ///
    /// Clears the visited set and records the run start timestamp.
    pub fn seed(&self, url: &str) -> DateTime<Utc> {
        let mut state = self.lock();
        state.clear();
        state.closed = false;
        state.queue.push_back(url.to_string());
        state.queued.insert(url.to_string());
        let now = Utc::now();
        state.run_started_at = Some(now);
        now
    }

    /// Removes and returns up to `max` URLs from the front of the queue
    pub fn next_batch(&self, max: usize) -> Vec<String> {
        let mut state = self.lock();
        let take = max.min(state.queue.len());
        let batch: Vec<String> = state.queue.drain(..take).collect();
        for url in &batch {
            state.queued.remove(url);
            state.claimed.insert(url.clone());
        }
        batch
    }

    /// Records `url` as fetched; idempotent
    pub fn mark_visited(&self, url: &str) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.visited.insert(url.to_string());
    }

    /// Appends `url` unless it is already known to this run
    ///
    /// Returns true if the URL was enqueued.
    pub fn offer(&self, url: &str) -> bool {
        let mut state = self.lock();
        if state.closed
            || state.visited.contains(url)
            || state.queued.contains(url)
            || state.claimed.contains(url)
        {
            return false;
        }
        state.queue.push_back(url.to_string());
        state.queued.insert(url.to_string());
        true
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.lock().visited.contains(url)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    pub fn remaining_count(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }

    /// Start of the most recent run, if any
    pub fn run_started_at(&self) -> Option<DateTime<Utc>> {
        self.lock().run_started_at
    }

    /// Clears the queue and the visited set
    pub fn reset(&self) {
        self.lock().clear();
    }

    /// Resets and refuses further `offer` / `mark_visited` calls until the
    /// next `seed`
    ///
    /// Units still in flight after a stop land here and leave no trace.
    pub fn close(&self) {
        let mut state = self.lock();
        state.clear();
        state.closed = true;
    }
}
