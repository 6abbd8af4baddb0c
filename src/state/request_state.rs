/// Request state definitions for tracking crawl progress
///
/// This module defines every state a crawl request can be in between being
/// queued and reaching a terminal outcome.
use std::fmt;

/// Represents the current state of a request in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    // ===== Active States =====
    /// Request is queued and waiting for its turn
    Pending,

    /// Request is being fetched (pacing delay included)
    Fetching,

    /// The fetched page was a block page
    Blocked,

    /// The fetched page is being turned into a record or child links
    Extracting,

    /// The attempt failed; the request either goes back to Pending or is exhausted
    Failed,

    // ===== Terminal States =====
    /// A SEARCH page was expanded into child requests
    EnqueuedChildren,

    /// A PROPERTY record (possibly error-shaped) was written to the sink
    Emitted,

    /// The retry budget ran out and an error record was written
    Exhausted,
}

impl RequestState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::EnqueuedChildren | Self::Emitted | Self::Exhausted
        )
    }

    /// Returns true if this is an active state
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::EnqueuedChildren | Self::Emitted)
    }

    /// Checks whether moving from this state to `to` is a legal transition
    pub fn can_transition_to(&self, to: RequestState) -> bool {
        use RequestState::*;

        matches!(
            (self, to),
            (Pending, Fetching)
                | (Fetching, Blocked)
                | (Fetching, Extracting)
                | (Fetching, Failed)
                | (Blocked, Failed)
                | (Extracting, EnqueuedChildren)
                | (Extracting, Emitted)
                | (Extracting, Failed)
                | (Failed, Pending)
                | (Failed, Exhausted)
        )
    }

    /// Short lowercase name used in logs and stored records
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Blocked => "blocked",
            Self::Extracting => "extracting",
            Self::Failed => "failed",
            Self::EnqueuedChildren => "enqueued_children",
            Self::Emitted => "emitted",
            Self::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RequestState::*;

    const ALL: [RequestState; 8] = [
        Pending,
        Fetching,
        Blocked,
        Extracting,
        Failed,
        EnqueuedChildren,
        Emitted,
        Exhausted,
    ];

    #[test]
    fn test_terminal_states() {
        assert!(EnqueuedChildren.is_terminal());
        assert!(Emitted.is_terminal());
        assert!(Exhausted.is_terminal());

        assert!(Pending.is_active());
        assert!(Failed.is_active());
    }

    #[test]
    fn test_success_states() {
        assert!(Emitted.is_success());
        assert!(EnqueuedChildren.is_success());
        assert!(!Exhausted.is_success());
    }

    #[test]
    fn test_happy_path_transitions() {
        assert!(Pending.can_transition_to(Fetching));
        assert!(Fetching.can_transition_to(Extracting));
        assert!(Extracting.can_transition_to(Emitted));
        assert!(Extracting.can_transition_to(EnqueuedChildren));
    }

    #[test]
    fn test_block_and_retry_transitions() {
        assert!(Fetching.can_transition_to(Blocked));
        assert!(Blocked.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Pending));
        assert!(Failed.can_transition_to(Exhausted));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!Pending.can_transition_to(Emitted));
        assert!(!Blocked.can_transition_to(Extracting));
        assert!(!Fetching.can_transition_to(Pending));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(EnqueuedChildren.to_string(), "enqueued_children");
        assert_eq!(Pending.to_string(), "pending");
    }
}
