//! Image Resolver
//!
//! Gallery images are discovered through several overlapping sources and
//! pushed through three explicit stages:
//!
//! 1. [`ImageResolver::collect`] gathers raw candidates into a [`CandidateSet`]
//! 2. [`CandidateSet::normalize`] rewrites thumbnails to their full-size form
//!    and deduplicates, producing a [`NormalizedSet`]
//! 3. [`NormalizedSet::filter`] drops decorative assets and, optionally, files
//!    that do not look like listing photos
//!
//! Each stage consumes its input and returns a new value; discovery order is
//! preserved throughout. Running the pipeline on its own output is a no-op.

use crate::extract::document::PageDocument;
use crate::extract::profile::{compile_pattern, ImageSpec};
use crate::extract::strategy::compile_selector;
use crate::extract::ExtractionError;
use regex::Regex;
use scraper::Selector;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// Substrings that mark icons, logos, avatars and tiny fixed-size images
pub const DECORATIVE_MARKERS: &[&str] = &["icon", "logo", "avatar", "40x40", "50x50"];

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

const IMG_SOURCE_ATTRIBUTES: &[&str] = &["src", "data-src", "data-lazy-src"];

static SCRIPT_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^"'\s\\<>]+\.(?:jpe?g|png|webp)[^"'\s\\<>]*"#)
        .expect("valid script image regex")
});

static FIT_IN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/fit-in/\d+x\d+/(?:filters:[^/]*/)?").expect("valid fit-in regex")
});

static SIZE_SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\d+x\d+/").expect("valid size segment regex"));

static SIZE_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(?:small|medium)\b").expect("valid size suffix regex"));

/// Raw image URLs in order of first discovery
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    urls: Vec<String>,
    seen: HashSet<String>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a candidate; returns false if the exact string was already present
    pub fn insert(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if url.is_empty() || self.seen.contains(&url) {
            return false;
        }

        self.seen.insert(url.clone());
        self.urls.push(url);
        true
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }

    /// Canonicalizes every candidate and removes duplicates
    ///
    /// Raw URLs sharing a canonical form collapse into one entry, positioned
    /// where the first of them was discovered. Every raw form is kept for the
    /// decorative checks of the filter stage.
    pub fn normalize(self) -> NormalizedSet {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut entries: Vec<NormalizedImage> = Vec::new();

        for raw in self.urls {
            let canonical = canonicalize(&raw);
            match index.get(&canonical) {
                Some(&i) => entries[i].raws.push(raw),
                None => {
                    index.insert(canonical.clone(), entries.len());
                    entries.push(NormalizedImage {
                        raws: vec![raw],
                        canonical,
                    });
                }
            }
        }

        NormalizedSet { entries }
    }
}

impl<S: Into<String>> FromIterator<S> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = CandidateSet::new();
        for url in iter {
            set.insert(url);
        }
        set
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NormalizedImage {
    /// Raw forms in discovery order; never empty
    raws: Vec<String>,
    canonical: String,
}

/// Canonical image URLs, deduplicated, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedSet {
    entries: Vec<NormalizedImage>,
}

impl NormalizedSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.canonical.as_str())
    }

    /// Drops decorative images and, with a listing-id rule, unrelated ones
    ///
    /// An image survives when its canonical form and at least one of its raw
    /// forms pass, so a thumbnail seen before the full-size file cannot hide it.
    pub fn filter(self, rules: &ImageFilter) -> ResolvedImages {
        let urls: Vec<String> = self
            .entries
            .into_iter()
            .filter(|entry| {
                rules.accepts(&entry.canonical) && entry.raws.iter().any(|raw| rules.accepts(raw))
            })
            .map(|entry| entry.canonical)
            .collect();

        ResolvedImages {
            count: urls.len(),
            urls,
        }
    }
}

/// Final image list of a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedImages {
    pub urls: Vec<String>,
    pub count: usize,
}

/// Rules applied in the filter stage
#[derive(Debug, Clone)]
pub struct ImageFilter {
    decorative_markers: Vec<String>,
    listing_id: Option<Regex>,
}

impl ImageFilter {
    pub fn new(decorative_markers: Vec<String>, listing_id: Option<Regex>) -> Self {
        Self {
            decorative_markers: decorative_markers
                .into_iter()
                .map(|m| m.to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            listing_id,
        }
    }

    fn accepts(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        if self
            .decorative_markers
            .iter()
            .any(|marker| lower.contains(marker.as_str()))
        {
            return false;
        }

        match &self.listing_id {
            Some(pattern) => pattern.is_match(file_name(url)),
            None => true,
        }
    }
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self::new(
            DECORATIVE_MARKERS.iter().map(|m| m.to_string()).collect(),
            None,
        )
    }
}

/// Discovers, canonicalizes and filters listing images
#[derive(Debug, Clone)]
pub struct ImageResolver {
    host_marker: Option<String>,
    data_attributes: Vec<(String, Selector)>,
    filter: ImageFilter,
}

impl ImageResolver {
    pub fn from_spec(spec: &ImageSpec) -> Result<Self, ExtractionError> {
        let mut data_attributes = Vec::with_capacity(spec.data_attributes.len());
        for attr in &spec.data_attributes {
            let selector = compile_selector("data-attribute", &format!("[{attr}]"))?;
            data_attributes.push((attr.clone(), selector));
        }

        let listing_id = spec
            .listing_id_pattern
            .as_deref()
            .map(|p| compile_pattern("image-listing-id", p))
            .transpose()?;

        Ok(Self {
            host_marker: spec.host_marker.clone(),
            data_attributes,
            filter: ImageFilter::new(spec.decorative_markers.clone(), listing_id),
        })
    }

    /// Gathers raw candidates from every discovery source
    pub fn collect(&self, page: &PageDocument) -> CandidateSet {
        let mut candidates = CandidateSet::new();

        self.collect_img_attributes(page, &mut candidates);
        self.collect_srcsets(page, &mut candidates);
        self.collect_picture_sources(page, &mut candidates);
        self.collect_script_literals(page, &mut candidates);
        self.collect_data_attributes(page, &mut candidates);

        candidates
    }

    /// Runs the normalize and filter stages over an existing candidate set
    pub fn resolve(&self, candidates: CandidateSet) -> ResolvedImages {
        candidates.normalize().filter(&self.filter)
    }

    /// Collects, normalizes and filters the images of a page
    pub fn resolve_page(&self, page: &PageDocument) -> ResolvedImages {
        let candidates = self.collect(page);
        tracing::debug!("{} raw image candidates on {}", candidates.len(), page.url());
        self.resolve(candidates)
    }

    fn collect_img_attributes(&self, page: &PageDocument, out: &mut CandidateSet) {
        let Some(selector) = static_selector("img") else {
            return;
        };

        for img in page.select(&selector) {
            let Some(src) = IMG_SOURCE_ATTRIBUTES
                .iter()
                .filter_map(|attr| img.value().attr(attr))
                .find(|value| self.matches_host(value))
            else {
                continue;
            };

            if has_image_extension(src) {
                push_absolute(page, src, out);
            }
        }
    }

    fn collect_srcsets(&self, page: &PageDocument, out: &mut CandidateSet) {
        let Some(selector) = static_selector("img[srcset]") else {
            return;
        };

        for img in page.select(&selector) {
            let Some(srcset) = img.value().attr("srcset") else {
                continue;
            };
            if !self.matches_host(srcset) {
                continue;
            }

            for url in srcset_urls(srcset) {
                if has_image_extension(url) {
                    push_absolute(page, url, out);
                }
            }
        }
    }

    fn collect_picture_sources(&self, page: &PageDocument, out: &mut CandidateSet) {
        let Some(selector) = static_selector("picture source[srcset]") else {
            return;
        };

        for source in page.select(&selector) {
            let Some(srcset) = source.value().attr("srcset") else {
                continue;
            };
            if !self.matches_host(srcset) {
                continue;
            }

            if let Some(first) = srcset_urls(srcset).next() {
                push_absolute(page, first, out);
            }
        }
    }

    fn collect_script_literals(&self, page: &PageDocument, out: &mut CandidateSet) {
        let Some(selector) = static_selector("script") else {
            return;
        };

        for script in page.select(&selector) {
            let content: String = script.text().collect();
            let content = content.replace("\\/", "/");

            for found in SCRIPT_URL_RE.find_iter(&content) {
                if self.matches_host(found.as_str()) {
                    push_absolute(page, found.as_str(), out);
                }
            }
        }
    }

    fn collect_data_attributes(&self, page: &PageDocument, out: &mut CandidateSet) {
        for (attr, selector) in &self.data_attributes {
            for element in page.select(selector) {
                let Some(value) = element.value().attr(attr) else {
                    continue;
                };

                for url in data_attribute_urls(value) {
                    push_absolute(page, &url, out);
                }
            }
        }
    }

    fn matches_host(&self, value: &str) -> bool {
        match &self.host_marker {
            Some(marker) => value.contains(marker.as_str()),
            None => true,
        }
    }
}

/// Strips thumbnail sizing segments and rewrites small/medium variants to large
///
/// Size segments are removed until none remain so the result is a fixed point.
fn canonicalize(url: &str) -> String {
    let mut current = FIT_IN_RE.replace_all(url, "/").into_owned();

    loop {
        let next = SIZE_SEGMENT_RE.replace_all(&current, "/").into_owned();
        if next == current {
            break;
        }
        current = next;
    }

    SIZE_SUFFIX_RE.replace_all(&current, "-large").into_owned()
}

/// URLs of a srcset list, descriptors dropped
fn srcset_urls(srcset: &str) -> impl Iterator<Item = &str> {
    srcset
        .split(',')
        .filter_map(|entry| entry.split_whitespace().next())
}

/// URLs held by a data attribute: a JSON array (strings or `{url|src}`
/// objects) or a comma-separated list of absolute URLs
fn data_attribute_urls(value: &str) -> Vec<String> {
    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Object(obj) => obj
                    .get("url")
                    .or_else(|| obj.get("src"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                _ => None,
            })
            .collect(),
        Ok(_) => Vec::new(),
        Err(_) => value
            .split(',')
            .map(str::trim)
            .filter(|u| u.starts_with("http"))
            .map(str::to_string)
            .collect(),
    }
}

fn push_absolute(page: &PageDocument, raw: &str, out: &mut CandidateSet) {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("data:") {
        return;
    }

    if let Ok(url) = page.url().join(raw) {
        if matches!(url.scheme(), "http" | "https") {
            out.insert(url.to_string());
        }
    }
}

fn has_image_extension(url: &str) -> bool {
    let lower = url.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.contains(ext))
}

fn file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

fn static_selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn page(html: &str) -> PageDocument {
        PageDocument::parse(
            html,
            Url::parse("https://www.domain.com.au/10-smith-st-kirwan-qld-4817-2018").unwrap(),
        )
    }

    fn domain_resolver() -> ImageResolver {
        ImageResolver::from_spec(&ImageSpec {
            host_marker: Some("domain.com.au".to_string()),
            ..ImageSpec::default()
        })
        .unwrap()
    }

    #[test]
    fn test_canonicalize_strips_size_segments() {
        assert_eq!(
            canonicalize("https://rimh2.domainstatic.com.au/fit-in/800x600/filters:format(webp)/2018_1.jpg"),
            "https://rimh2.domainstatic.com.au/2018_1.jpg"
        );
        assert_eq!(
            canonicalize("https://img.domain.com.au/320x240/160x120/photo.jpg"),
            "https://img.domain.com.au/photo.jpg"
        );
        assert_eq!(
            canonicalize("https://img.domain.com.au/photo-small.jpg"),
            "https://img.domain.com.au/photo-large.jpg"
        );
        assert_eq!(
            canonicalize("https://img.domain.com.au/photo-medium.webp"),
            "https://img.domain.com.au/photo-large.webp"
        );
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let resolver = domain_resolver();
        let candidates: CandidateSet = [
            "https://img.domain.com.au/800x600/a.jpg",
            "https://img.domain.com.au/a.jpg",
            "https://img.domain.com.au/b-small.jpg",
            "https://img.domain.com.au/logo.png",
            "https://img.domain.com.au/c.webp",
        ]
        .into_iter()
        .collect();

        let first = resolver.resolve(candidates);
        let second = resolver.resolve(first.urls.iter().cloned().collect());

        assert_eq!(
            first.urls,
            vec![
                "https://img.domain.com.au/a.jpg",
                "https://img.domain.com.au/b-large.jpg",
                "https://img.domain.com.au/c.webp",
            ]
        );
        assert_eq!(first.count, 3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_decorative_images_never_returned() {
        let resolver = domain_resolver();
        let candidates: CandidateSet = [
            "https://img.domain.com.au/agency-logo.png",
            "https://img.domain.com.au/icons/pin.png",
            "https://img.domain.com.au/agent-avatar.jpg",
            "https://img.domain.com.au/40x40/agent.jpg",
            "https://img.domain.com.au/thumb_50x50.jpg",
            "https://img.domain.com.au/LOGO-large.jpg",
            "https://img.domain.com.au/house.jpg",
        ]
        .into_iter()
        .collect();

        let resolved = resolver.resolve(candidates);

        assert_eq!(resolved.urls, vec!["https://img.domain.com.au/house.jpg"]);
        for url in &resolved.urls {
            for marker in DECORATIVE_MARKERS {
                assert!(!url.contains(marker));
            }
        }
    }

    #[test]
    fn test_thumbnail_before_full_size_keeps_photo() {
        let resolver = domain_resolver();
        let thumb_first: CandidateSet = [
            "https://img.domain.com.au/40x40/house.jpg",
            "https://img.domain.com.au/house.jpg",
        ]
        .into_iter()
        .collect();
        let full_first: CandidateSet = [
            "https://img.domain.com.au/house.jpg",
            "https://img.domain.com.au/40x40/house.jpg",
        ]
        .into_iter()
        .collect();

        let expected = vec!["https://img.domain.com.au/house.jpg".to_string()];
        assert_eq!(resolver.resolve(thumb_first).urls, expected);
        assert_eq!(resolver.resolve(full_first).urls, expected);
    }

    #[test]
    fn test_lone_thumbnail_still_dropped() {
        let resolver = domain_resolver();
        let candidates: CandidateSet = ["https://img.domain.com.au/40x40/agent.jpg"]
            .into_iter()
            .collect();

        assert!(resolver.resolve(candidates).urls.is_empty());
    }

    #[test]
    fn test_collect_from_every_source() {
        let doc = page(
            r#"<html><body>
            <img src="https://img.domain.com.au/1.jpg">
            <img data-src="//img.domain.com.au/2.jpg">
            <img src="https://cdn.other.com/ad.jpg">
            <img srcset="https://img.domain.com.au/3.jpg 1x, https://img.domain.com.au/4.jpg 2x">
            <picture><source srcset="https://img.domain.com.au/5.webp 800w, https://img.domain.com.au/6.webp 1600w"></picture>
            <script>window.__DATA__ = {"photo":"https:\/\/img.domain.com.au\/7.jpg"};</script>
            <div data-gallery='["https://img.domain.com.au/8.jpg", {"url": "https://img.domain.com.au/9.jpg"}]'></div>
            <div data-photos="https://img.domain.com.au/10.jpg, https://img.domain.com.au/11.jpg"></div>
            </body></html>"#,
        );

        let resolved = domain_resolver().resolve_page(&doc);
        let names: Vec<&str> = resolved.urls.iter().map(|u| file_name(u)).collect();

        assert_eq!(
            names,
            vec![
                "1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.webp", "7.jpg", "8.jpg", "9.jpg", "10.jpg",
                "11.jpg"
            ]
        );
        assert_eq!(resolved.count, 10);
    }

    #[test]
    fn test_overlapping_sources_deduplicate() {
        let doc = page(
            r#"<img src="https://img.domain.com.au/320x240/house.jpg"
                    srcset="https://img.domain.com.au/house.jpg 2x">
               <script>var g = ["https://img.domain.com.au/house.jpg"];</script>"#,
        );

        let resolved = domain_resolver().resolve_page(&doc);
        assert_eq!(resolved.urls, vec!["https://img.domain.com.au/house.jpg"]);
    }

    #[test]
    fn test_listing_id_filter() {
        let resolver = ImageResolver::from_spec(&ImageSpec {
            listing_id_pattern: Some(r"^2018\d*_".to_string()),
            ..ImageSpec::default()
        })
        .unwrap();

        let candidates: CandidateSet = [
            "https://img.example.com/2018446271_1_1.jpg",
            "https://img.example.com/banner_promo.jpg",
        ]
        .into_iter()
        .collect();

        let resolved = resolver.resolve(candidates);
        assert_eq!(resolved.urls, vec!["https://img.example.com/2018446271_1_1.jpg"]);
    }

    #[test]
    fn test_no_images() {
        let resolved = domain_resolver().resolve_page(&page("<p>No gallery</p>"));
        assert!(resolved.urls.is_empty());
        assert_eq!(resolved.count, 0);
    }
}
