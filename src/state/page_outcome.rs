use std::fmt;

/// Result of processing one URL in a crawl run
///
/// The variants separate the failure classes callers care about:
///
/// - `Indexed` and `ExtractFailed` happen after a successful fetch, so the
///   URL is marked visited and will not be fetched again this run
/// - `Disallowed` is a permanent skip decided by the policy guard
/// - `FetchFailed` leaves the URL unvisited; a later run may retry it
/// - `Cancelled` means the job was stopped before the unit finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Content extracted and handed to the document store
    Indexed { discovered: usize },

    /// Fetched, but content or links could not be extracted
    ExtractFailed { reason: String, discovered: usize },

    /// Refused by the policy guard
    Disallowed,

    /// Page could not be opened or loaded
    FetchFailed { reason: String },

    /// The job was stopped while the unit was in flight
    Cancelled,
}

impl PageOutcome {
    /// Returns true if a later run may fetch this URL again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchFailed { .. })
    }

    /// Returns true if the URL was recorded as visited
    pub fn marks_visited(&self) -> bool {
        matches!(self, Self::Indexed { .. } | Self::ExtractFailed { .. })
    }

    /// Number of new links this unit offered to the frontier
    pub fn discovered(&self) -> usize {
        match self {
            Self::Indexed { discovered } | Self::ExtractFailed { discovered, .. } => *discovered,
            _ => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Indexed { .. } => "indexed",
            Self::ExtractFailed { .. } => "extract_failed",
            Self::Disallowed => "disallowed",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExtractFailed { reason, .. } | Self::FetchFailed { reason } => {
                write!(f, "{}: {}", self.as_str(), reason)
            }
            _ => write!(f, "{}", self.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visited_boundary() {
        assert!(PageOutcome::Indexed { discovered: 2 }.marks_visited());
        assert!(PageOutcome::ExtractFailed {
            reason: "boom".into(),
            discovered: 0
        }
        .marks_visited());
        assert!(!PageOutcome::FetchFailed { reason: "timeout".into() }.marks_visited());
        assert!(!PageOutcome::Disallowed.marks_visited());
        assert!(!PageOutcome::Cancelled.marks_visited());
    }

    #[test]
    fn test_only_fetch_failures_are_retryable() {
        assert!(PageOutcome::FetchFailed { reason: "503".into() }.is_retryable());
        assert!(!PageOutcome::Disallowed.is_retryable());
        assert!(!PageOutcome::ExtractFailed {
            reason: "bad html".into(),
            discovered: 1
        }
        .is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(PageOutcome::Disallowed.to_string(), "disallowed");
        assert_eq!(
            PageOutcome::FetchFailed { reason: "HTTP 500".into() }.to_string(),
            "fetch_failed: HTTP 500"
        );
        assert_eq!(PageOutcome::Indexed { discovered: 3 }.discovered(), 3);
    }
}
