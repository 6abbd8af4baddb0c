//! Scheduler for managing the request queue and the crawl budget
//!
//! This module handles:
//! - FIFO queue management for pending requests
//! - Run-wide URL deduplication
//! - The request budget (first attempts only; retries ride on the original charge)
//! - Global concurrency limiting via a semaphore

use crate::config::CrawlerConfig;
use crate::state::CrawlRequest;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// Upper bound on first attempts in one run
///
/// Invariant: `issued <= max_requests`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlBudget {
    max_requests: u32,
    issued: u32,
}

impl CrawlBudget {
    pub fn new(max_requests: u32) -> Self {
        Self {
            max_requests,
            issued: 0,
        }
    }

    /// Charges one request; false once the bound has been reached
    pub fn try_charge(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.issued += 1;
        true
    }

    pub fn is_exhausted(&self) -> bool {
        self.issued >= self.max_requests
    }

    pub fn issued(&self) -> u32 {
        self.issued
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn remaining(&self) -> u32 {
        self.max_requests.saturating_sub(self.issued)
    }
}

/// A request cleared to run, with its concurrency permit
pub struct ScheduledRequest {
    pub request: CrawlRequest,

    /// The semaphore permit for this request
    pub _permit: OwnedSemaphorePermit,
}

/// Result of offering a request to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued,
    Duplicate,
    BudgetExhausted,
}

/// Counts from enqueuing the links of one search page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChildrenOutcome {
    pub enqueued: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

/// Scheduler owns the queue, the seen-URL set and the budget
pub struct Scheduler {
    /// Global semaphore for limiting concurrent requests
    semaphore: Arc<Semaphore>,

    /// Requests waiting to run, in arrival order
    queue: VecDeque<CrawlRequest>,

    /// Every URL ever accepted into the queue
    seen: HashSet<String>,

    budget: CrawlBudget,

    duplicates: usize,
    budget_rejected: usize,
}

impl Scheduler {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrency.max(1) as usize)),
            queue: VecDeque::new(),
            seen: HashSet::new(),
            budget: CrawlBudget::new(config.max_requests_per_crawl),
            duplicates: 0,
            budget_rejected: 0,
        }
    }

    /// Offers a new request to the queue
    ///
    /// Requests whose URL was seen before are dropped, and nothing new is
    /// accepted once the budget has been spent.
    pub fn enqueue(&mut self, request: CrawlRequest) -> EnqueueOutcome {
        let key = request.url().to_string();

        if self.seen.contains(&key) {
            self.duplicates += 1;
            tracing::debug!("Skipping duplicate {} {}", request.label(), key);
            return EnqueueOutcome::Duplicate;
        }

        if self.budget.is_exhausted() {
            self.budget_rejected += 1;
            tracing::debug!("Budget exhausted, rejecting {} {}", request.label(), key);
            return EnqueueOutcome::BudgetExhausted;
        }

        self.seen.insert(key);
        self.queue.push_back(request);
        EnqueueOutcome::Enqueued
    }

    /// Enqueues the listing links found on a search page as PROPERTY requests
    pub fn enqueue_children(&mut self, parent: &CrawlRequest, links: Vec<Url>) -> ChildrenOutcome {
        let mut outcome = ChildrenOutcome::default();
        let original_address = parent.original_address().map(str::to_string);

        for url in links {
            let child = CrawlRequest::property(url, true, original_address.clone());
            match self.enqueue(child) {
                EnqueueOutcome::Enqueued => outcome.enqueued += 1,
                EnqueueOutcome::Duplicate => outcome.duplicates += 1,
                EnqueueOutcome::BudgetExhausted => outcome.rejected += 1,
            }
        }

        outcome
    }

    /// Puts a failed request back at the end of the queue
    ///
    /// The request must already be back in the pending state. Retries are not
    /// charged against the budget.
    pub fn retry(&mut self, request: CrawlRequest) {
        tracing::debug!(
            "Re-queuing {} {} (attempt {})",
            request.label(),
            request.url(),
            request.attempt() + 1
        );
        self.queue.push_back(request);
    }

    /// Gets the next request to run
    ///
    /// This method:
    /// 1. Returns None if the queue is empty
    /// 2. Acquires a global semaphore permit
    /// 3. Pops requests until one can run: first attempts must be charged to
    ///    the budget, and those that cannot be charged are dropped
    ///
    /// # Returns
    ///
    /// * `Some(ScheduledRequest)` - A request that's ready to run
    /// * `None` - Nothing left that the budget allows
    pub async fn next_request(&mut self) -> Option<ScheduledRequest> {
        if self.queue.is_empty() {
            return None;
        }

        let permit = self.semaphore.clone().acquire_owned().await.ok()?;

        while let Some(request) = self.queue.pop_front() {
            if request.attempt() > 0 || self.budget.try_charge() {
                return Some(ScheduledRequest {
                    request,
                    _permit: permit,
                });
            }

            self.budget_rejected += 1;
            tracing::debug!(
                "Budget of {} requests spent, dropping {} {}",
                self.budget.max_requests(),
                request.label(),
                request.url()
            );
        }

        None
    }

    pub fn budget(&self) -> &CrawlBudget {
        &self.budget
    }

    /// Returns the number of requests in the queue
    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    /// Returns whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn budget_rejected(&self) -> usize {
        self.budget_rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Label, RequestState};

    fn create_test_config(budget: u32) -> CrawlerConfig {
        CrawlerConfig {
            max_requests_per_crawl: budget,
            max_request_retries: 3,
            request_timeout_seconds: 60,
            max_concurrency: 1,
        }
    }

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://www.domain.com.au{}", path)).unwrap()
    }

    #[test]
    fn test_budget_bound() {
        let mut budget = CrawlBudget::new(2);
        assert!(budget.try_charge());
        assert!(budget.try_charge());
        assert!(!budget.try_charge());
        assert_eq!(budget.issued(), 2);
        assert_eq!(budget.remaining(), 0);
        assert!(budget.is_exhausted());
    }

    #[test]
    fn test_new_scheduler() {
        let scheduler = Scheduler::new(&create_test_config(10));
        assert_eq!(scheduler.queue_size(), 0);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_duplicate_urls_dropped() {
        let mut scheduler = Scheduler::new(&create_test_config(10));

        let first = scheduler.enqueue(CrawlRequest::property(url("/listing-1"), false, None));
        let second = scheduler.enqueue(CrawlRequest::property(url("/listing-1"), true, None));

        assert_eq!(first, EnqueueOutcome::Enqueued);
        assert_eq!(second, EnqueueOutcome::Duplicate);
        assert_eq!(scheduler.queue_size(), 1);
        assert_eq!(scheduler.duplicates(), 1);
    }

    #[test]
    fn test_children_carry_address() {
        let mut scheduler = Scheduler::new(&create_test_config(10));
        let parent = CrawlRequest::search(url("/sale/?street=1"), "1 Main St");

        let outcome = scheduler.enqueue_children(
            &parent,
            vec![url("/listing-1"), url("/listing-2"), url("/listing-1")],
        );

        assert_eq!(
            outcome,
            ChildrenOutcome {
                enqueued: 2,
                duplicates: 1,
                rejected: 0
            }
        );
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let mut scheduler = Scheduler::new(&create_test_config(10));
        scheduler.enqueue(CrawlRequest::property(url("/listing-1"), false, None));
        scheduler.enqueue(CrawlRequest::property(url("/listing-2"), false, None));

        let first = scheduler.next_request().await.unwrap();
        assert_eq!(first.request.url().path(), "/listing-1");
        drop(first);

        let second = scheduler.next_request().await.unwrap();
        assert_eq!(second.request.url().path(), "/listing-2");
    }

    #[tokio::test]
    async fn test_next_request_empty_queue() {
        let mut scheduler = Scheduler::new(&create_test_config(10));
        assert!(scheduler.next_request().await.is_none());
    }

    #[tokio::test]
    async fn test_budget_stops_first_attempts() {
        let mut scheduler = Scheduler::new(&create_test_config(1));
        for i in 0..5 {
            scheduler.enqueue(CrawlRequest::search(
                url(&format!("/sale/?street={}", i)),
                format!("{} Main St", i),
            ));
        }

        let scheduled = scheduler.next_request().await.unwrap();
        assert_eq!(scheduled.request.label(), Label::Search);
        drop(scheduled);

        assert!(scheduler.next_request().await.is_none());
        assert_eq!(scheduler.budget().issued(), 1);
        assert_eq!(scheduler.budget_rejected(), 4);
    }

    #[tokio::test]
    async fn test_retry_not_charged() {
        let mut scheduler = Scheduler::new(&create_test_config(1));
        scheduler.enqueue(CrawlRequest::property(url("/listing-1"), false, None));

        let mut request = scheduler.next_request().await.unwrap().request;
        request.transition(RequestState::Fetching).unwrap();
        request.transition(RequestState::Failed).unwrap();
        request.retry().unwrap();
        scheduler.retry(request);

        let retried = scheduler.next_request().await.unwrap();
        assert_eq!(retried.request.attempt(), 1);
        assert_eq!(scheduler.budget().issued(), 1);
    }

    #[test]
    fn test_children_rejected_when_budget_spent() {
        let mut scheduler = Scheduler::new(&create_test_config(1));
        assert!(scheduler.budget.try_charge());

        let parent = CrawlRequest::search(url("/sale/?street=1"), "1 Main St");
        let outcome = scheduler.enqueue_children(&parent, vec![url("/listing-1")]);

        assert_eq!(outcome.rejected, 1);
        assert!(scheduler.is_empty());
    }
}
