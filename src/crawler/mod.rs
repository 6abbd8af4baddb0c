//! Crawler module for paced, block-aware listing crawls
//!
//! This module contains the core crawling logic, including:
//! - The page transport contract and its reqwest implementation
//! - Session feedback and block page detection
//! - Pacing between requests
//! - Seed expansion, request scheduling and the crawl budget
//! - Overall crawl coordination

mod block;
mod coordinator;
mod fetcher;
mod pacing;
mod scheduler;
mod seeds;
mod session;

pub use block::{BlockDetector, BlockVerdict};
pub use coordinator::{run_crawl, Coordinator};
pub use fetcher::{
    build_http_client, FetchOptions, FetchedPage, Fetcher, HttpFetcher, TransportError,
};
pub use pacing::{FixedPacer, Pacer, PacingPolicy};
pub use scheduler::{ChildrenOutcome, CrawlBudget, EnqueueOutcome, ScheduledRequest, Scheduler};
pub use seeds::{address_slug, expand_seeds, search_url, SeedPlan};
pub use session::{NoopSession, Session};

use crate::config::Config;
use crate::output::RunSummary;
use crate::HarvestError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the HTTP transport and session
/// 2. Open the configured output sink
/// 3. Expand seeds into requests
/// 4. Fetch, classify and extract pages until the queue or budget runs out
/// 5. Return the run summary
pub async fn crawl(config: &Config) -> Result<RunSummary, HarvestError> {
    run_crawl(config, None).await
}
