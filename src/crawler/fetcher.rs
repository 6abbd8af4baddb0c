//! HTTP fetcher implementation
//!
//! This module defines the transport contract used by the crawler and its
//! reqwest-backed implementation:
//! - Building HTTP clients that present the configured browser identity
//! - Fetching pages with a per-request timeout
//! - Error classification into retryable and permanent failures
//! - Session rotation by rebuilding the client with a fresh cookie jar

use crate::config::{SessionConfig, StealthConfig};
use crate::crawler::session::Session;
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{redirect::Policy, Client, Proxy};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Transport-level failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl TransportError {
    /// Whether another attempt could plausibly succeed
    ///
    /// | Condition | Retry |
    /// |-----------|-------|
    /// | Timeout, connection failure, body read | yes |
    /// | HTTP 408, 5xx | yes |
    /// | HTTP 404, 410 and other 4xx | no |
    /// | Client construction | no |
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Timeout(_)
            | TransportError::Connect(_)
            | TransportError::Body(_)
            | TransportError::Request(_) => true,
            TransportError::Status(status) => *status == 408 || *status >= 500,
            TransportError::Client(_) => false,
        }
    }
}

/// Per-request transport options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Hard wall-clock limit for the whole request
    pub timeout: Duration,
}

impl FetchOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// A fetched response, whatever its status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: Url,

    /// HTTP status code
    pub status: u16,

    /// Response body
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Page transport
///
/// Any HTTP response is returned as a [`FetchedPage`]; only failures to get a
/// response at all are errors. Status interpretation is left to the caller.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<FetchedPage, TransportError>;
}

/// Builds an HTTP client presenting the configured browser identity
///
/// # Arguments
///
/// * `stealth` - Header and identity hints
/// * `proxy_url` - Optional proxy every request is routed through
/// * `jar` - Cookie store for this identity
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(TransportError::Client)` - A header or the proxy URL was invalid
pub fn build_http_client(
    stealth: &StealthConfig,
    proxy_url: Option<&str>,
    jar: Arc<Jar>,
) -> Result<Client, TransportError> {
    let mut builder = Client::builder()
        .user_agent(stealth.user_agent.as_str())
        .default_headers(stealth_headers(stealth)?)
        .cookie_provider(jar)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true);

    if let Some(proxy_url) = proxy_url {
        let proxy = Proxy::all(proxy_url)
            .map_err(|e| TransportError::Client(format!("invalid proxy URL: {}", e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| TransportError::Client(e.to_string()))
}

/// Default headers sent with every request
fn stealth_headers(stealth: &StealthConfig) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();

    headers.insert(ACCEPT, header_value(&stealth.accept)?);
    headers.insert(ACCEPT_LANGUAGE, header_value(&stealth.accept_language)?);

    if stealth.mask_automation {
        // Navigation hints a real browser sends on a top-level page load
        for (name, value) in [
            ("upgrade-insecure-requests", "1"),
            ("sec-fetch-dest", "document"),
            ("sec-fetch-mode", "navigate"),
            ("sec-fetch-site", "none"),
            ("sec-fetch-user", "?1"),
        ] {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }
        headers.insert(
            HeaderName::from_static("viewport-width"),
            header_value(&stealth.viewport.width.to_string())?,
        );
        headers.insert(
            HeaderName::from_static("sec-ch-viewport-height"),
            header_value(&stealth.viewport.height.to_string())?,
        );
    }

    for (name, value) in &stealth.extra_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::Client(format!("invalid header name '{}': {}", name, e)))?;
        headers.insert(name, header_value(value)?);
    }

    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue, TransportError> {
    HeaderValue::from_str(value)
        .map_err(|e| TransportError::Client(format!("invalid header value '{}': {}", value, e)))
}

/// reqwest transport that also acts as the run's [`Session`]
///
/// Retiring the session swaps in a new client with an empty cookie jar, so
/// the next request starts from a fresh identity.
pub struct HttpFetcher {
    stealth: StealthConfig,
    proxy_url: Option<String>,
    client: RwLock<Client>,
    generation: AtomicU64,
    good_responses: AtomicU64,
}

impl HttpFetcher {
    pub fn new(stealth: &StealthConfig, session: &SessionConfig) -> Result<Self, TransportError> {
        let client = build_http_client(
            stealth,
            session.proxy_url.as_deref(),
            Arc::new(Jar::default()),
        )?;

        Ok(Self {
            stealth: stealth.clone(),
            proxy_url: session.proxy_url.clone(),
            client: RwLock::new(client),
            generation: AtomicU64::new(0),
            good_responses: AtomicU64::new(0),
        })
    }

    /// Number of times the identity has been replaced
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Usable pages served to the current identity
    pub fn good_responses(&self) -> u64 {
        self.good_responses.load(Ordering::Relaxed)
    }

    fn current_client(&self) -> Result<Client, TransportError> {
        self.client
            .read()
            .map(|client| client.clone())
            .map_err(|_| TransportError::Client("client lock poisoned".to_string()))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<FetchedPage, TransportError> {
        let client = self.current_client()?;

        let response = client
            .get(url.clone())
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| classify(e, options.timeout))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(options.timeout)
            } else {
                TransportError::Body(e.to_string())
            }
        })?;

        tracing::debug!("GET {} -> {} ({} bytes)", final_url, status, body.len());

        Ok(FetchedPage {
            url: final_url,
            status,
            body,
        })
    }
}

impl Session for HttpFetcher {
    fn retire(&self, reason: &str) {
        let rebuilt = build_http_client(
            &self.stealth,
            self.proxy_url.as_deref(),
            Arc::new(Jar::default()),
        );

        match (rebuilt, self.client.write()) {
            (Ok(client), Ok(mut slot)) => {
                *slot = client;
                let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                self.good_responses.store(0, Ordering::Relaxed);
                tracing::warn!("Session retired ({}), now on identity #{}", reason, generation);
            }
            (Err(e), _) => {
                tracing::error!("Session retire failed, keeping current identity: {}", e);
            }
            (_, Err(_)) => {
                tracing::error!("Session retire failed: client lock poisoned");
            }
        }
    }

    fn mark_good(&self) {
        self.good_responses.fetch_add(1, Ordering::Relaxed);
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout)
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Request(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&StealthConfig::default(), None, Arc::new(Jar::default()));
        assert!(client.is_ok());
    }

    #[test]
    fn test_invalid_proxy_rejected() {
        let result = build_http_client(
            &StealthConfig::default(),
            Some("http://[invalid"),
            Arc::new(Jar::default()),
        );
        assert!(matches!(result, Err(TransportError::Client(_))));
    }

    #[test]
    fn test_invalid_extra_header_rejected() {
        let mut stealth = StealthConfig::default();
        stealth
            .extra_headers
            .insert("bad header".to_string(), "1".to_string());

        assert!(matches!(
            stealth_headers(&stealth),
            Err(TransportError::Client(_))
        ));
    }

    #[test]
    fn test_stealth_headers() {
        let mut stealth = StealthConfig::default();
        stealth.extra_headers.insert("DNT".to_string(), "1".to_string());

        let headers = stealth_headers(&stealth).unwrap();
        assert_eq!(headers.get(ACCEPT_LANGUAGE).unwrap(), "en-AU,en;q=0.9");
        assert_eq!(headers.get("sec-fetch-mode").unwrap(), "navigate");
        assert_eq!(headers.get("viewport-width").unwrap(), "1920");
        assert_eq!(headers.get("sec-ch-viewport-height").unwrap(), "1080");
        assert_eq!(headers.get("dnt").unwrap(), "1");

        stealth.mask_automation = false;
        let headers = stealth_headers(&stealth).unwrap();
        assert!(headers.get("sec-fetch-mode").is_none());
    }

    #[test]
    fn test_retry_classification() {
        assert!(TransportError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(TransportError::Connect("refused".to_string()).is_retryable());
        assert!(TransportError::Status(503).is_retryable());
        assert!(TransportError::Status(408).is_retryable());
        assert!(!TransportError::Status(404).is_retryable());
        assert!(!TransportError::Status(410).is_retryable());
        assert!(!TransportError::Client("bad".to_string()).is_retryable());
    }

    #[test]
    fn test_retire_rotates_identity() {
        let fetcher =
            HttpFetcher::new(&StealthConfig::default(), &SessionConfig::default()).unwrap();
        fetcher.mark_good();
        assert_eq!(fetcher.good_responses(), 1);

        fetcher.retire("blocked");
        assert_eq!(fetcher.generation(), 1);
        assert_eq!(fetcher.good_responses(), 0);
    }
}
