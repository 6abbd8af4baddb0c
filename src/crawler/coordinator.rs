//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives every request through its lifecycle:
//! - Pacing before each fetch
//! - Fetching under a hard timeout
//! - Block detection and session feedback
//! - Extraction (listing pages) or link discovery (search pages)
//! - Retrying or giving up with an error record
//!
//! Nothing that goes wrong with a single request stops the run. Only a
//! failing sink or an internal state error is propagated.

use crate::config::Config;
use crate::crawler::block::BlockDetector;
use crate::crawler::fetcher::{FetchOptions, FetchedPage, Fetcher, HttpFetcher, TransportError};
use crate::crawler::pacing::{Pacer, PacingPolicy};
use crate::crawler::scheduler::{ScheduledRequest, Scheduler};
use crate::crawler::seeds::expand_seeds;
use crate::crawler::session::Session;
use crate::extract::{ExtractionError, LinkDiscovery, PageDocument, PropertyRecord, RecordExtractor};
use crate::output::{build_sink, RecordSink, RunSummary};
use crate::state::{CrawlRequest, Label, RequestState};
use crate::HarvestError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// What a fetched page turned out to be
enum PageOutcome {
    Blocked(String),
    HttpError(u16),
    Listing(Result<PropertyRecord, ExtractionError>),
    SearchResults(Vec<Url>),
}

/// Main crawler coordinator structure
pub struct Coordinator {
    scheduler: Scheduler,
    fetcher: Arc<dyn Fetcher>,
    session: Arc<dyn Session>,
    pacer: Box<dyn Pacer>,
    detector: BlockDetector,
    extractor: RecordExtractor,
    links: LinkDiscovery,
    sink: Box<dyn RecordSink>,
    options: FetchOptions,
    max_retries: u32,
    summary: RunSummary,
}

impl Coordinator {
    /// Creates a coordinator with the configured seeds already queued
    ///
    /// # Arguments
    ///
    /// * `config` - The validated run configuration
    /// * `fetcher` - Page transport
    /// * `session` - Identity that block pages are reported to
    /// * `sink` - Destination for emitted records
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError)` - The site profile or a seed was invalid
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn Fetcher>,
        session: Arc<dyn Session>,
        sink: Box<dyn RecordSink>,
    ) -> Result<Self, HarvestError> {
        let profile = config.site.resolve_profile()?;
        let compiled = profile.compile()?;
        let plan = expand_seeds(config, &profile)?;

        let mut scheduler = Scheduler::new(&config.crawler);
        for request in plan.requests {
            scheduler.enqueue(request);
        }

        tracing::info!(
            "Using site profile '{}' with {} seed requests",
            profile.name,
            scheduler.queue_size()
        );

        Ok(Self {
            scheduler,
            fetcher,
            session,
            pacer: Box::new(PacingPolicy::from_config(&config.pacing)),
            detector: BlockDetector::from_config(&config.block),
            extractor: compiled.extractor,
            links: compiled.links,
            sink,
            options: FetchOptions::with_timeout(Duration::from_secs(
                config.crawler.request_timeout_seconds,
            )),
            max_retries: config.crawler.max_request_retries,
            summary: RunSummary::new(),
        })
    }

    /// Replaces the pacing policy
    pub fn with_pacer(mut self, pacer: impl Pacer + 'static) -> Self {
        self.pacer = Box::new(pacer);
        self
    }

    /// Requests waiting in the queue
    pub fn queued(&self) -> usize {
        self.scheduler.queue_size()
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Runs the main crawl loop
    ///
    /// Processes requests one at a time until the queue is empty or the
    /// request budget is spent, then finalizes the sink.
    pub async fn run(&mut self) -> Result<RunSummary, HarvestError> {
        tracing::info!(
            "Starting run: {} requests queued, budget {}",
            self.scheduler.queue_size(),
            self.scheduler.budget().max_requests()
        );
        let start_time = std::time::Instant::now();

        while let Some(scheduled) = self.scheduler.next_request().await {
            let ScheduledRequest { request, _permit } = scheduled;
            self.process(request).await?;
        }

        if self.scheduler.budget().is_exhausted() {
            tracing::info!(
                "Request budget of {} spent, run complete",
                self.scheduler.budget().max_requests()
            );
        } else {
            tracing::info!("Queue is empty, run complete");
        }

        self.summary.requests_issued = u64::from(self.scheduler.budget().issued());
        self.summary.duplicates = self.scheduler.duplicates() as u64;
        self.summary.budget_rejected = self.scheduler.budget_rejected() as u64;

        self.sink.finalize()?;

        tracing::info!("Run took {:?}", start_time.elapsed());
        self.summary.log();

        Ok(self.summary.clone())
    }

    /// Processes a single request
    ///
    /// This method:
    /// 1. Waits for the pacing delay
    /// 2. Fetches the page under the hard timeout
    /// 3. Classifies the page (blocked, HTTP error, listing, search results)
    /// 4. Emits, enqueues, retries or gives up accordingly
    async fn process(&mut self, mut request: CrawlRequest) -> Result<(), HarvestError> {
        let delay = match request.attempt() {
            0 => self.pacer.next_delay(),
            attempt => self.pacer.retry_delay(attempt),
        };
        if !delay.is_zero() {
            tracing::info!("Waiting {:?} before {}", delay, request.url());
            tokio::time::sleep(delay).await;
        }

        tracing::info!(
            "Processing {}: {} (attempt {})",
            request.label(),
            request.url(),
            request.attempt() + 1
        );
        request.transition(RequestState::Fetching)?;

        let fetched = match tokio::time::timeout(
            self.options.timeout,
            self.fetcher.fetch(request.url(), &self.options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.options.timeout)),
        };

        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Transport error for {}: {}", request.url(), e);
                request.transition(RequestState::Failed)?;
                let retryable = e.is_retryable();
                return self.retry_or_give_up(request, e.to_string(), retryable);
            }
        };

        match self.classify(&request, &page) {
            PageOutcome::Blocked(reason) => {
                self.summary.blocked += 1;
                request.transition(RequestState::Blocked)?;
                tracing::warn!("Blocked on {}: {}", request.url(), reason);
                self.session.retire(&reason);

                request.transition(RequestState::Failed)?;
                self.retry_or_give_up(request, format!("blocked: {}", reason), true)
            }

            PageOutcome::HttpError(status) => {
                let error = TransportError::Status(status);
                tracing::warn!("{} returned HTTP {}", request.url(), status);
                request.transition(RequestState::Failed)?;
                self.retry_or_give_up(request, error.to_string(), error.is_retryable())
            }

            PageOutcome::Listing(extracted) => {
                request.transition(RequestState::Extracting)?;
                self.session.mark_good();

                let record = match extracted {
                    Ok(mut record) => {
                        record.original_address = request.original_address().map(str::to_string);
                        if record.image_count == 0 {
                            self.summary.drift_warnings += 1;
                        }
                        tracing::info!(
                            "Extracted: {} - {}",
                            record.full_address.as_deref().unwrap_or("(no address)"),
                            record.price_text.as_deref().unwrap_or("(no price)")
                        );
                        record
                    }
                    Err(e) => {
                        tracing::error!("Error extracting {}: {}", request.url(), e);
                        PropertyRecord::failed(
                            page.url.as_str(),
                            e.to_string(),
                            request.original_address().map(str::to_string),
                        )
                    }
                };

                self.emit(&record)?;
                request.transition(RequestState::Emitted)?;
                Ok(())
            }

            PageOutcome::SearchResults(links) => {
                request.transition(RequestState::Extracting)?;
                self.session.mark_good();

                if links.is_empty() {
                    self.summary.drift_warnings += 1;
                    tracing::warn!(
                        "No property links found on {} - page structure may have changed",
                        request.url()
                    );
                }

                let found = links.len();
                let outcome = self.scheduler.enqueue_children(&request, links);
                self.summary.links_enqueued += outcome.enqueued as u64;

                tracing::info!(
                    "Found {} property links: {} enqueued, {} duplicates, {} over budget",
                    found,
                    outcome.enqueued,
                    outcome.duplicates,
                    outcome.rejected
                );

                request.transition(RequestState::EnqueuedChildren)?;
                Ok(())
            }
        }
    }

    /// Inspects a fetched page without holding the parsed tree past this call
    fn classify(&self, request: &CrawlRequest, page: &FetchedPage) -> PageOutcome {
        let document = PageDocument::parse(&page.body, page.url.clone());

        let verdict = self.detector.inspect(
            document.title().as_deref(),
            document.body_text(),
            Some(page.status),
        );
        if verdict.blocked {
            return PageOutcome::Blocked(verdict.reason.unwrap_or_else(|| "unknown".to_string()));
        }

        if !page.is_success() {
            return PageOutcome::HttpError(page.status);
        }

        match request.label() {
            Label::Search => PageOutcome::SearchResults(self.links.discover(&document)),
            Label::Property => PageOutcome::Listing(self.extractor.try_extract(&document)),
        }
    }

    /// Re-queues a failed request, or emits its error record once attempts run out
    fn retry_or_give_up(
        &mut self,
        mut request: CrawlRequest,
        error: String,
        retryable: bool,
    ) -> Result<(), HarvestError> {
        if retryable && request.attempt() < self.max_retries {
            request.retry()?;
            self.summary.retries += 1;
            tracing::warn!(
                "Retrying {} {} ({}/{}): {}",
                request.label(),
                request.url(),
                request.attempt(),
                self.max_retries,
                error
            );
            self.scheduler.retry(request);
            return Ok(());
        }

        request.transition(RequestState::Exhausted)?;
        tracing::error!(
            "{} {} failed after {} attempts: {}",
            request.label(),
            request.url(),
            request.attempt() + 1,
            error
        );

        let record = PropertyRecord::failed(
            request.url().as_str(),
            error,
            request.original_address().map(str::to_string),
        );
        self.emit(&record)
    }

    fn emit(&mut self, record: &PropertyRecord) -> Result<(), HarvestError> {
        self.sink.append(record)?;
        self.summary.records_emitted += 1;
        if record.is_error() {
            self.summary.error_records += 1;
        }
        Ok(())
    }
}

/// Runs a complete crawl over HTTP
///
/// # Arguments
///
/// * `config` - The validated run configuration
/// * `output` - Destination replacing the configured output path
///
/// # Returns
///
/// * `Ok(RunSummary)` - The run finished (individual requests may have failed)
/// * `Err(HarvestError)` - Setup failed or the sink stopped accepting records
pub async fn run_crawl(config: &Config, output: Option<&Path>) -> Result<RunSummary, HarvestError> {
    let transport = Arc::new(HttpFetcher::new(&config.stealth, &config.session)?);
    let fetcher: Arc<dyn Fetcher> = transport.clone();
    let session: Arc<dyn Session> = transport;

    let sink = build_sink(&config.output, output)?;

    let mut coordinator = Coordinator::new(config, fetcher, session, sink)?;
    coordinator.run().await
}
