use crate::extract::{Field, ImageSpec, LinkRuleSpec, SiteProfile, StrategySpec};
use crate::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Listing-Harvest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Free-text addresses; each becomes one SEARCH request
    #[serde(default)]
    pub addresses: Vec<String>,

    /// Direct listing URLs; each becomes one PROPERTY request
    #[serde(default, rename = "start-urls")]
    pub start_urls: Vec<StartUrl>,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(default)]
    pub pacing: PacingConfig,

    #[serde(default)]
    pub stealth: StealthConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default)]
    pub block: BlockConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// A direct listing URL entry
#[derive(Debug, Clone, Deserialize)]
pub struct StartUrl {
    pub url: String,
}

/// Crawl budget, retry and timeout configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Hard cap on the number of requests issued in one run
    #[serde(rename = "max-requests-per-crawl", default = "default_max_requests")]
    pub max_requests_per_crawl: u32,

    /// Number of retries after the first attempt before a request is dropped
    #[serde(rename = "max-request-retries", default = "default_max_retries")]
    pub max_request_retries: u32,

    /// Hard wall-clock timeout for a single fetch
    #[serde(rename = "request-timeout-seconds", default = "default_timeout")]
    pub request_timeout_seconds: u64,

    /// Maximum number of requests in flight at once
    #[serde(rename = "max-concurrency", default = "default_concurrency")]
    pub max_concurrency: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_requests_per_crawl: default_max_requests(),
            max_request_retries: default_max_retries(),
            request_timeout_seconds: default_timeout(),
            max_concurrency: default_concurrency(),
        }
    }
}

/// Pacing window configuration (milliseconds)
#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    #[serde(rename = "min-ms", default = "default_min_ms")]
    pub min_ms: u64,

    #[serde(rename = "max-ms", default = "default_max_ms")]
    pub max_ms: u64,

    /// Upper bound on the delay before a retried request
    #[serde(rename = "max-backoff-ms", default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_ms: default_min_ms(),
            max_ms: default_max_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Transport-level stealth hints handed to the fetcher
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StealthConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    #[serde(default = "default_accept")]
    pub accept: String,

    /// Ask browser-backed transports to suppress automation signals
    #[serde(default = "default_true")]
    pub mask_automation: bool,

    #[serde(default)]
    pub viewport: Viewport,

    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
}

impl Default for StealthConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            accept: default_accept(),
            mask_automation: true,
            viewport: Viewport::default(),
            extra_headers: BTreeMap::new(),
        }
    }
}

/// Browser viewport hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Proxy and session configuration, passed through to the transport
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionConfig {
    #[serde(default)]
    pub proxy_url: Option<String>,
}

/// Target site selection and per-target overrides
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Name of a built-in profile ("domain" or "realestate")
    #[serde(default = "default_profile")]
    pub profile: String,

    #[serde(default)]
    pub search_url_template: Option<String>,

    /// Replaces the strategy list of each named field
    #[serde(default)]
    pub fields: BTreeMap<Field, Vec<StrategySpec>>,

    #[serde(default)]
    pub links: Option<Vec<LinkRuleSpec>>,

    #[serde(default)]
    pub images: Option<ImageSpec>,

    /// Replaces the feature-list item selectors
    #[serde(default)]
    pub feature_list: Option<Vec<String>>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            search_url_template: None,
            fields: BTreeMap::new(),
            links: None,
            images: None,
            feature_list: None,
        }
    }
}

impl SiteConfig {
    /// Builds the effective site profile: the named built-in with overrides applied
    pub fn resolve_profile(&self) -> Result<SiteProfile, ConfigError> {
        let mut profile = SiteProfile::builtin(&self.profile)
            .ok_or_else(|| ConfigError::UnknownProfile(self.profile.clone()))?;

        if let Some(template) = &self.search_url_template {
            profile.search_url_template = template.clone();
        }
        for (field, strategies) in &self.fields {
            profile.fields.insert(*field, strategies.clone());
        }
        if let Some(links) = &self.links {
            profile.links = links.clone();
        }
        if let Some(images) = &self.images {
            profile.images = images.clone();
        }
        if let Some(feature_list) = &self.feature_list {
            profile.feature_list = feature_list.clone();
        }

        Ok(profile)
    }
}

/// Block page denylists
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BlockConfig {
    #[serde(default = "default_title_markers")]
    pub title_markers: Vec<String>,

    #[serde(default = "default_body_markers")]
    pub body_markers: Vec<String>,

    #[serde(default = "default_blocked_statuses")]
    pub blocked_statuses: Vec<u16>,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            title_markers: default_title_markers(),
            body_markers: default_body_markers(),
            blocked_statuses: default_blocked_statuses(),
        }
    }
}

/// Output sink configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Path to the JSON-lines file or SQLite database
    #[serde(default = "default_output_path")]
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            path: default_output_path(),
        }
    }
}

/// Supported sink formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jsonl,
    Sqlite,
}

fn default_max_requests() -> u32 {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout() -> u64 {
    60
}

fn default_concurrency() -> u32 {
    1
}

fn default_min_ms() -> u64 {
    2_000
}

fn default_max_ms() -> u64 {
    5_000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36"
        .to_string()
}

fn default_accept_language() -> String {
    "en-AU,en;q=0.9".to_string()
}

fn default_accept() -> String {
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8".to_string()
}

fn default_true() -> bool {
    true
}

fn default_profile() -> String {
    "domain".to_string()
}

fn default_title_markers() -> Vec<String> {
    vec!["403".to_string(), "access denied".to_string()]
}

fn default_body_markers() -> Vec<String> {
    vec![
        "unusual traffic".to_string(),
        "blocked".to_string(),
        "access denied".to_string(),
    ]
}

fn default_blocked_statuses() -> Vec<u16> {
    vec![401, 403, 429]
}

fn default_output_path() -> String {
    "properties.jsonl".to_string()
}
