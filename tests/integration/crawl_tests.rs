//! Integration tests for the crawler
//!
//! Most tests drive the coordinator through a scripted in-process fetcher so
//! every response, including block pages and transport failures, is under the
//! test's control. The last tests go over real HTTP against wiremock.

use async_trait::async_trait;
use listing_harvest::config::{Config, OutputConfig, OutputFormat, PacingConfig, StartUrl};
use listing_harvest::crawler::{
    run_crawl, search_url, Coordinator, FetchOptions, FetchedPage, Fetcher, FixedPacer, Session,
    TransportError,
};
use listing_harvest::extract::{LinkRuleSpec, PropertyRecord, SiteProfile};
use listing_harvest::output::MemorySink;
use listing_harvest::url::normalize_url;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING: &str = r#"<html>
<head><title>10 Smith Street, Kirwan QLD 4817 | Domain</title></head>
<body>
  <div data-testid="listing-details__button-copy-wrapper"><h1>10 Smith Street, Kirwan QLD 4817</h1></div>
  <div data-testid="listing-details__summary-title"><span>Offers over $485,000</span></div>
  <div data-testid="listing-summary-property-type"><span>House</span></div>
  <div data-testid="property-features-wrapper">
    <span data-testid="property-features-feature">4 <span>Beds</span></span>
    <span data-testid="property-features-feature">2 <span>Baths</span></span>
    <span data-testid="property-features-feature">2 <span>Parking</span></span>
  </div>
  <img src="https://rimh2.domain.com.au/fit-in/1600x1200/2018000001_1_1.jpg">
  <img src="https://rimh2.domain.com.au/2018000001_2_1.jpg">
</body></html>"#;

const BLOCK_PAGE: &str = r#"<html>
<head><title>Access Denied</title></head>
<body><h1>Access Denied</h1><p>You don't have permission to access this page.</p></body>
</html>"#;

/// Scripted transport: each URL answers with its queued responses in order,
/// repeating the last one once the queue is down to a single entry
#[derive(Default)]
struct ScriptedFetcher {
    routes: Mutex<HashMap<String, VecDeque<Result<(u16, String), TransportError>>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn route(&self, url: &str, responses: Vec<Result<(u16, String), TransportError>>) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), responses.into_iter().collect());
    }

    fn page(&self, url: &str, body: &str) {
        self.route(url, vec![Ok((200, body.to_string()))]);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_to(&self, url: &str) -> usize {
        self.calls().iter().filter(|u| u.as_str() == url).count()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url, _options: &FetchOptions) -> Result<FetchedPage, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());

        let mut routes = self.routes.lock().unwrap();
        let response = match routes.get_mut(url.as_str()) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Ok((404, "<html><body>Not here</body></html>".to_string())),
        };

        response.map(|(status, body)| FetchedPage {
            url: url.clone(),
            status,
            body,
        })
    }
}

#[derive(Default)]
struct RecordingSession {
    retired: Mutex<Vec<String>>,
    good: AtomicUsize,
}

impl Session for RecordingSession {
    fn retire(&self, reason: &str) {
        self.retired.lock().unwrap().push(reason.to_string());
    }

    fn mark_good(&self) {
        self.good.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    fetcher: Arc<ScriptedFetcher>,
    session: Arc<RecordingSession>,
    sink: MemorySink,
}

impl Harness {
    fn new() -> Self {
        Self {
            fetcher: Arc::new(ScriptedFetcher::default()),
            session: Arc::new(RecordingSession::default()),
            sink: MemorySink::new(),
        }
    }

    fn coordinator(&self, config: &Config) -> Coordinator {
        Coordinator::new(
            config,
            self.fetcher.clone(),
            self.session.clone(),
            Box::new(self.sink.clone()),
        )
        .expect("coordinator should build")
        .with_pacer(FixedPacer::zero())
    }
}

fn create_test_config(addresses: &[&str], start_urls: &[&str]) -> Config {
    let mut config = Config::default();
    config.addresses = addresses.iter().map(|a| a.to_string()).collect();
    config.start_urls = start_urls
        .iter()
        .map(|u| StartUrl { url: u.to_string() })
        .collect();
    config.crawler.max_requests_per_crawl = 50;
    config.crawler.max_request_retries = 2;
    config
}

/// The normalized search URL the domain profile builds for `address`
fn domain_search_url(address: &str) -> String {
    let template = SiteProfile::domain().search_url_template;
    normalize_url(&search_url(&template, address))
        .unwrap()
        .to_string()
}

fn listing(id: u32) -> String {
    format!("https://www.domain.com.au/{}-smith-street-kirwan-qld-4817-20180000{:02}", id, id)
}

fn listings_only(records: &[PropertyRecord]) -> Vec<&PropertyRecord> {
    records.iter().filter(|r| !r.is_error()).collect()
}

#[tokio::test]
async fn test_search_page_expands_to_unique_listings() {
    let harness = Harness::new();
    let search = domain_search_url("Smith Street Kirwan");

    harness.fetcher.page(
        &search,
        &format!(
            r#"<html><head><title>Search results</title></head><body>
            <a href="{0}">One</a>
            <a href="{1}/">Two</a>
            <a href="{2}?utm_source=feed">Three</a>
            <a href="{0}#photos">One again</a>
            <a href="/{3}">Two again</a>
            </body></html>"#,
            listing(1),
            listing(2),
            listing(3),
            listing(2).trim_start_matches("https://www.domain.com.au/"),
        ),
    );
    for id in 1..=3 {
        harness.fetcher.page(&listing(id), LISTING);
    }

    let config = create_test_config(&["Smith Street Kirwan"], &[]);
    let summary = harness.coordinator(&config).run().await.unwrap();

    assert_eq!(harness.fetcher.calls().len(), 4);
    for id in 1..=3 {
        assert_eq!(harness.fetcher.calls_to(&listing(id)), 1);
    }

    assert_eq!(summary.links_enqueued, 3);
    assert_eq!(summary.records_emitted, 3);
    assert_eq!(summary.error_records, 0);
    assert_eq!(summary.requests_issued, 4);

    let records = harness.sink.records();
    for record in &records {
        assert_eq!(record.original_address.as_deref(), Some("Smith Street Kirwan"));
        assert_eq!(record.price, Some(485_000));
        assert_eq!(record.image_count, 2);
    }
    assert_eq!(harness.session.good.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_budget_caps_first_attempts() {
    let harness = Harness::new();
    let addresses = ["1 A St", "2 B St", "3 C St", "4 D St", "5 E St"];
    for address in addresses {
        harness.fetcher.page(
            &domain_search_url(address),
            "<html><body><p>No results</p></body></html>",
        );
    }

    let mut config = create_test_config(&addresses, &[]);
    config.crawler.max_requests_per_crawl = 1;

    let summary = harness.coordinator(&config).run().await.unwrap();

    assert_eq!(harness.fetcher.calls().len(), 1);
    assert_eq!(summary.requests_issued, 1);
    assert_eq!(summary.budget_rejected, 4);
    assert_eq!(summary.drift_warnings, 1);
    assert!(harness.sink.is_empty());
}

#[tokio::test]
async fn test_missing_price_still_emits_listing() {
    let harness = Harness::new();
    let url = listing(7);
    harness.fetcher.page(
        &url,
        &LISTING.replace(
            r#"<div data-testid="listing-details__summary-title"><span>Offers over $485,000</span></div>"#,
            "",
        ),
    );

    let config = create_test_config(&[], &[&url]);
    let summary = harness.coordinator(&config).run().await.unwrap();

    assert_eq!(summary.error_records, 0);
    let records = harness.sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].price, None);
    assert_eq!(records[0].price_text, None);
    assert_eq!(records[0].bedrooms, Some(4));
    assert_eq!(records[0].original_address, None);
}

#[tokio::test]
async fn test_block_page_retires_session_then_gives_up() {
    let harness = Harness::new();
    let search = domain_search_url("10 Smith Street Kirwan");
    harness.fetcher.page(&search, BLOCK_PAGE);

    let config = create_test_config(&["10 Smith Street Kirwan"], &[]);
    let summary = harness.coordinator(&config).run().await.unwrap();

    // One first attempt plus two retries
    assert_eq!(harness.fetcher.calls_to(&search), 3);
    assert_eq!(summary.blocked, 3);
    assert_eq!(summary.retries, 2);
    assert_eq!(summary.requests_issued, 1);

    let retired = harness.session.retired.lock().unwrap().clone();
    assert_eq!(retired.len(), 3);
    assert_eq!(retired[0], "title matched 'access denied'");

    let records = harness.sink.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].is_error());
    assert_eq!(records[0].url, search);
    assert_eq!(records[0].original_address.as_deref(), Some("10 Smith Street Kirwan"));
    assert!(records[0].error.as_deref().unwrap().starts_with("blocked"));
}

#[tokio::test]
async fn test_block_then_recovery() {
    let harness = Harness::new();
    let url = listing(8);
    harness.fetcher.route(
        &url,
        vec![
            Ok((429, "<html><body>Slow down</body></html>".to_string())),
            Ok((200, LISTING.to_string())),
        ],
    );

    let config = create_test_config(&[], &[&url]);
    let summary = harness.coordinator(&config).run().await.unwrap();

    assert_eq!(summary.blocked, 1);
    assert_eq!(summary.retries, 1);
    assert_eq!(summary.error_records, 0);
    assert_eq!(
        harness.session.retired.lock().unwrap().as_slice(),
        ["HTTP status 429".to_string()]
    );
    assert_eq!(listings_only(&harness.sink.records()).len(), 1);
}

#[tokio::test]
async fn test_transport_failure_then_success() {
    let harness = Harness::new();
    let url = listing(9);
    harness.fetcher.route(
        &url,
        vec![
            Err(TransportError::Connect("connection reset".to_string())),
            Ok((200, LISTING.to_string())),
        ],
    );

    let config = create_test_config(&[], &[&url]);
    let summary = harness.coordinator(&config).run().await.unwrap();

    assert_eq!(harness.fetcher.calls_to(&url), 2);
    assert_eq!(summary.retries, 1);
    assert_eq!(summary.blocked, 0);
    assert!(harness.session.retired.lock().unwrap().is_empty());

    let records = harness.sink.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].is_error());
    assert_eq!(records[0].listing_id.as_deref(), Some("2018000009"));
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let harness = Harness::new();
    let missing = listing(10);
    let present = listing(11);
    harness
        .fetcher
        .route(&missing, vec![Ok((404, "<html><body>Not found</body></html>".to_string()))]);
    harness.fetcher.page(&present, LISTING);

    let config = create_test_config(&[], &[&missing, &present]);
    let summary = harness.coordinator(&config).run().await.unwrap();

    assert_eq!(harness.fetcher.calls_to(&missing), 1);
    assert_eq!(summary.retries, 0);
    assert_eq!(summary.records_emitted, 2);
    assert_eq!(summary.error_records, 1);

    let records = harness.sink.records();
    let error = records.iter().find(|r| r.is_error()).unwrap();
    assert_eq!(error.url, missing);
    assert_eq!(error.error.as_deref(), Some("HTTP status 404"));
}

#[tokio::test]
async fn test_duplicate_seeds_fetched_once() {
    let harness = Harness::new();
    let url = listing(12);
    harness.fetcher.page(&url, LISTING);

    let with_tracking = format!("{}?utm_source=email", url);
    let config = create_test_config(&[], &[&url, &with_tracking]);
    let summary = harness.coordinator(&config).run().await.unwrap();

    assert_eq!(harness.fetcher.calls().len(), 1);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.records_emitted, 1);
}

fn http_config(server: &MockServer, output: OutputConfig) -> Config {
    let mut config = create_test_config(&["10 Smith Street Kirwan"], &[]);
    config.pacing = PacingConfig {
        min_ms: 0,
        max_ms: 0,
        max_backoff_ms: 0,
    };
    config.crawler.max_request_retries = 1;
    config.site.search_url_template = Some(format!("{}/search?street={{query}}", server.uri()));
    config.site.links = Some(vec![LinkRuleSpec {
        name: "result-card".to_string(),
        css: "a.listing[href]".to_string(),
        require: None,
        exclude: None,
    }]);
    config.output = output;
    config
}

#[tokio::test]
async fn test_full_crawl_over_http() {
    let mock_server = MockServer::start().await;
    let temp_dir = tempfile::TempDir::new().unwrap();
    let out_path = temp_dir.path().join("properties.jsonl");

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"<html><head><title>Results</title></head><body>
                    <a class="listing" href="/10-smith-street-kirwan-qld-4817-2018000001">10 Smith Street</a>
                    <a class="listing" href="/10-smith-street-kirwan-qld-4817-2018000001">10 Smith Street</a>
                    </body></html>"#,
                )
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/10-smith-street-kirwan-qld-4817-2018000001"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(LISTING)
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = http_config(
        &mock_server,
        OutputConfig {
            format: OutputFormat::Jsonl,
            path: out_path.display().to_string(),
        },
    );

    let summary = run_crawl(&config, None).await.expect("crawl should succeed");

    assert_eq!(summary.requests_issued, 2);
    assert_eq!(summary.records_emitted, 1);
    assert_eq!(summary.error_records, 0);

    let contents = std::fs::read_to_string(&out_path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1);

    let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(record["fullAddress"], "10 Smith Street, Kirwan QLD 4817");
    assert_eq!(record["price"], 485_000);
    assert_eq!(record["originalAddress"], "10 Smith Street Kirwan");
    assert_eq!(record["listingId"], "2018000001");
    assert_eq!(record["imageCount"], 2);
}

#[tokio::test]
async fn test_rate_limited_over_http() {
    let mock_server = MockServer::start().await;
    let temp_dir = tempfile::TempDir::new().unwrap();
    let out_path = temp_dir.path().join("properties.db");

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too many requests"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = http_config(
        &mock_server,
        OutputConfig {
            format: OutputFormat::Sqlite,
            path: "unused.db".to_string(),
        },
    );

    let summary = run_crawl(&config, Some(&out_path))
        .await
        .expect("crawl should succeed");

    assert_eq!(summary.blocked, 2);
    assert_eq!(summary.retries, 1);
    assert_eq!(summary.error_records, 1);
    assert!(out_path.exists());

    let conn = rusqlite::Connection::open(&out_path).unwrap();
    let (error, original): (String, String) = conn
        .query_row("SELECT error, original_address FROM properties", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(error, "blocked: HTTP status 429");
    assert_eq!(original, "10 Smith Street Kirwan");
}
