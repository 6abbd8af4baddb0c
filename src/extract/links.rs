//! Listing link discovery on search result pages

use crate::extract::document::PageDocument;
use crate::extract::profile::{compile_pattern, LinkRuleSpec};
use crate::extract::strategy::compile_selector;
use crate::extract::ExtractionError;
use crate::url::resolve_href;
use regex::Regex;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

struct LinkRule {
    name: String,
    selector: Selector,
    require: Option<Regex>,
    exclude: Option<String>,
}

impl LinkRule {
    fn accepts(&self, url: &Url) -> bool {
        let s = url.as_str();

        if let Some(exclude) = &self.exclude {
            if s.contains(exclude.as_str()) {
                return false;
            }
        }

        self.require.as_ref().map_or(true, |re| re.is_match(s))
    }
}

/// Finds property URLs on a search page
///
/// Every rule is applied in order; hrefs are resolved against the page URL,
/// normalized, and returned once each in order of first appearance.
pub struct LinkDiscovery {
    rules: Vec<LinkRule>,
}

impl LinkDiscovery {
    pub fn from_specs(specs: &[LinkRuleSpec]) -> Result<Self, ExtractionError> {
        let mut rules = Vec::with_capacity(specs.len());

        for spec in specs {
            rules.push(LinkRule {
                name: spec.name.clone(),
                selector: compile_selector(&spec.name, &spec.css)?,
                require: spec
                    .require
                    .as_deref()
                    .map(|p| compile_pattern(&spec.name, p))
                    .transpose()?,
                exclude: spec.exclude.clone(),
            });
        }

        Ok(Self { rules })
    }

    pub fn discover(&self, page: &PageDocument) -> Vec<Url> {
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for rule in &self.rules {
            let before = links.len();

            for anchor in page.select(&rule.selector) {
                let Some(href) = anchor.value().attr("href") else {
                    continue;
                };
                let Some(url) = resolve_href(href, page.url()) else {
                    continue;
                };

                if url == *page.url() || !rule.accepts(&url) {
                    continue;
                }

                if seen.insert(url.to_string()) {
                    links.push(url);
                }
            }

            tracing::trace!("link rule '{}' found {} new links", rule.name, links.len() - before);
        }

        links
    }
}
