//! Seed expansion: configured addresses and start URLs become crawl requests

use crate::config::Config;
use crate::extract::SiteProfile;
use crate::state::{CrawlRequest, Label};
use crate::url::normalize_url;
use crate::HarvestError;

/// Requests to start a run with, plus any budget warning raised on the way
#[derive(Debug, Clone)]
pub struct SeedPlan {
    pub requests: Vec<CrawlRequest>,
    pub budget_warning: Option<String>,
}

/// Expands the configured seeds
///
/// Each address becomes one request built from the profile's search URL
/// template; each start URL becomes one PROPERTY request. Warns when the
/// request budget cannot cover at least a search and a listing per address.
pub fn expand_seeds(config: &Config, profile: &SiteProfile) -> Result<SeedPlan, HarvestError> {
    let mut requests = Vec::with_capacity(config.addresses.len() + config.start_urls.len());

    for address in &config.addresses {
        let address = address.trim();
        let url = normalize_url(&search_url(&profile.search_url_template, address))?;

        let request = match profile.address_label {
            Label::Search => CrawlRequest::search(url, address),
            Label::Property => CrawlRequest::property(url, false, Some(address.to_string())),
        };
        requests.push(request);
    }

    for start in &config.start_urls {
        let url = normalize_url(&start.url)?;
        requests.push(CrawlRequest::property(url, false, None));
    }

    let needed = 2 * config.addresses.len() as u64;
    let budget = u64::from(config.crawler.max_requests_per_crawl);
    let budget_warning = (budget < needed).then(|| {
        let message = format!(
            "max-requests-per-crawl is {} but {} addresses need at least {} requests (one search and one listing each)",
            budget,
            config.addresses.len(),
            needed
        );
        tracing::warn!("{}", message);
        message
    });

    Ok(SeedPlan {
        requests,
        budget_warning,
    })
}

/// Fills the `{query}` and `{slug}` placeholders of a search URL template
pub fn search_url(template: &str, address: &str) -> String {
    let query: String = url::form_urlencoded::byte_serialize(address.as_bytes()).collect();

    template
        .replace("{query}", &query)
        .replace("{slug}", &address_slug(address))
}

/// Lowercased address with whitespace runs turned into `-` and anything
/// outside `[a-z0-9-]` removed
pub fn address_slug(address: &str) -> String {
    address
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}
