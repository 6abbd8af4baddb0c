use crate::config::types::{BlockConfig, Config, CrawlerConfig, OutputConfig, PacingConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_pacing_config(&config.pacing)?;
    validate_seeds(config)?;
    validate_site(config)?;
    validate_block_config(&config.block)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_requests_per_crawl < 1 {
        return Err(ConfigError::Validation(format!(
            "max_requests_per_crawl must be >= 1, got {}",
            config.max_requests_per_crawl
        )));
    }

    if config.request_timeout_seconds < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_seconds must be >= 1".to_string(),
        ));
    }

    if config.max_concurrency < 1 || config.max_concurrency > 16 {
        return Err(ConfigError::Validation(format!(
            "max_concurrency must be between 1 and 16, got {}",
            config.max_concurrency
        )));
    }

    Ok(())
}

/// Validates the pacing window
fn validate_pacing_config(config: &PacingConfig) -> Result<(), ConfigError> {
    if config.min_ms > config.max_ms {
        return Err(ConfigError::Validation(format!(
            "pacing min_ms ({}) must not exceed max_ms ({})",
            config.min_ms, config.max_ms
        )));
    }

    if config.max_backoff_ms < config.max_ms {
        return Err(ConfigError::Validation(format!(
            "pacing max_backoff_ms ({}) must be >= max_ms ({})",
            config.max_backoff_ms, config.max_ms
        )));
    }

    Ok(())
}

/// Validates addresses and start URLs
fn validate_seeds(config: &Config) -> Result<(), ConfigError> {
    if config.addresses.is_empty() && config.start_urls.is_empty() {
        return Err(ConfigError::Validation(
            "at least one address or start URL is required".to_string(),
        ));
    }

    for address in &config.addresses {
        if address.trim().is_empty() {
            return Err(ConfigError::Validation(
                "addresses must not contain empty entries".to_string(),
            ));
        }
    }

    for start in &config.start_urls {
        let url = Url::parse(&start.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid start URL '{}': {}", start.url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Start URL '{}' must use http or https",
                start.url
            )));
        }
    }

    Ok(())
}

/// Validates the site profile: template placeholders and every extraction rule
fn validate_site(config: &Config) -> Result<(), ConfigError> {
    let profile = config.site.resolve_profile()?;

    if !config.addresses.is_empty()
        && !profile.search_url_template.contains("{query}")
        && !profile.search_url_template.contains("{slug}")
    {
        return Err(ConfigError::Validation(format!(
            "search_url_template '{}' must contain {{query}} or {{slug}}",
            profile.search_url_template
        )));
    }

    profile.compile()?;
    Ok(())
}

/// Validates the block page denylists
fn validate_block_config(config: &BlockConfig) -> Result<(), ConfigError> {
    let has_marker = config
        .title_markers
        .iter()
        .chain(config.body_markers.iter())
        .any(|m| !m.trim().is_empty());

    if !has_marker {
        return Err(ConfigError::Validation(
            "block detection needs at least one non-empty title or body marker".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
