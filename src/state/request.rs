//! A single unit of crawl work and its lifecycle
//!
//! A request carries its kind, URL, attempt counter and, for address seeds,
//! the address it was built from. State changes go through `transition`,
//! which rejects moves the lifecycle does not allow.

use crate::state::RequestState;
use crate::HarvestError;
use std::fmt;
use url::Url;

/// Which handler a request is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Search,
    Property,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Search => f.write_str("SEARCH"),
            Label::Property => f.write_str("PROPERTY"),
        }
    }
}

/// Label-specific request payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// A search results page built from a seed address
    Search { original_address: String },

    /// A single listing page, either seeded directly or found on a search page
    Property {
        from_search: bool,
        original_address: Option<String>,
    },
}

/// A unit of crawl work
///
/// Immutable apart from the attempt counter and its lifecycle state.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    url: Url,
    kind: RequestKind,
    attempt: u32,
    state: RequestState,
}

impl CrawlRequest {
    /// Creates a SEARCH request for a seed address
    pub fn search(url: Url, original_address: impl Into<String>) -> Self {
        Self::new(
            url,
            RequestKind::Search {
                original_address: original_address.into(),
            },
        )
    }

    /// Creates a PROPERTY request
    pub fn property(url: Url, from_search: bool, original_address: Option<String>) -> Self {
        Self::new(
            url,
            RequestKind::Property {
                from_search,
                original_address,
            },
        )
    }

    fn new(url: Url, kind: RequestKind) -> Self {
        Self {
            url,
            kind,
            attempt: 0,
            state: RequestState::Pending,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    pub fn label(&self) -> Label {
        match self.kind {
            RequestKind::Search { .. } => Label::Search,
            RequestKind::Property { .. } => Label::Property,
        }
    }

    /// Number of failed attempts so far (0 on the first try)
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// The seed address this request traces back to, if any
    pub fn original_address(&self) -> Option<&str> {
        match &self.kind {
            RequestKind::Search { original_address } => Some(original_address),
            RequestKind::Property {
                original_address, ..
            } => original_address.as_deref(),
        }
    }

    /// Moves the request to a new lifecycle state
    ///
    /// # Returns
    ///
    /// * `Err(HarvestError::InvalidTransition)` - The move is not allowed from the current state
    pub fn transition(&mut self, to: RequestState) -> Result<(), HarvestError> {
        if !self.state.can_transition_to(to) {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to,
            });
        }

        tracing::trace!("{} {}: {} -> {}", self.label(), self.url, self.state, to);
        self.state = to;
        Ok(())
    }

    /// Re-queues a failed request for another attempt
    pub fn retry(&mut self) -> Result<(), HarvestError> {
        self.transition(RequestState::Pending)?;
        self.attempt += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_search_request() {
        let req = CrawlRequest::search(url("https://example.com/search?q=a"), "1 Main St");

        assert_eq!(req.label(), Label::Search);
        assert_eq!(req.attempt(), 0);
        assert_eq!(req.state(), RequestState::Pending);
        assert_eq!(req.original_address(), Some("1 Main St"));
    }

    #[test]
    fn test_property_request_without_address() {
        let req = CrawlRequest::property(url("https://example.com/listing-1"), true, None);

        assert_eq!(req.label(), Label::Property);
        assert_eq!(req.original_address(), None);
        assert!(matches!(
            req.kind(),
            RequestKind::Property {
                from_search: true,
                ..
            }
        ));
    }

    #[test]
    fn test_retry_increments_attempt() {
        let mut req = CrawlRequest::property(url("https://example.com/listing-1"), false, None);
        req.transition(RequestState::Fetching).unwrap();
        req.transition(RequestState::Failed).unwrap();
        req.retry().unwrap();

        assert_eq!(req.attempt(), 1);
        assert_eq!(req.state(), RequestState::Pending);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut req = CrawlRequest::property(url("https://example.com/listing-1"), false, None);
        let result = req.transition(RequestState::Emitted);

        assert!(matches!(
            result,
            Err(HarvestError::InvalidTransition {
                from: RequestState::Pending,
                to: RequestState::Emitted
            })
        ));
        assert_eq!(req.state(), RequestState::Pending);
    }

    #[test]
    fn test_retry_requires_failed_state() {
        let mut req = CrawlRequest::property(url("https://example.com/listing-1"), false, None);
        assert!(req.retry().is_err());
        assert_eq!(req.attempt(), 0);
    }

    #[test]
    fn test_label_display() {
        assert_eq!(Label::Search.to_string(), "SEARCH");
        assert_eq!(Label::Property.to_string(), "PROPERTY");
    }
}
