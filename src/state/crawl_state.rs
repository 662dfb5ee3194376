use serde::Serialize;
use std::fmt;

/// Crawl job lifecycle states
///
/// ```text
/// Idle -> Running -> Completed | Stopped | Failed
/// ```
///
/// A completed or failed job may run again. A stopped job is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlState {
    /// Created, never run
    Idle,

    /// The batch loop is active
    Running,

    /// The frontier was exhausted or the page budget reached
    Completed,

    /// An explicit stop was requested
    Stopped,

    /// Setup failed (the renderer could not launch)
    Failed,
}

impl CrawlState {
    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        use CrawlState::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Idle, Stopped)
                | (Running, Completed)
                | (Running, Stopped)
                | (Running, Failed)
                | (Completed, Running)
                | (Completed, Stopped)
                | (Failed, Running)
                | (Failed, Stopped)
        )
    }

    /// Returns true once a run has ended (successfully or not)
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Failed)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
