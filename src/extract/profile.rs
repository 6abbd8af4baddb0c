//! Site profiles: per-target extraction rules expressed as data
//!
//! A profile names, for every record field, an ordered list of location
//! strategies (stable attribute selectors first, legacy class names next,
//! generic fallbacks last), plus the search URL template, listing-link rules
//! and image discovery rules. Two built-in profiles ship with the crate and
//! any part of them can be overridden from the configuration file.

use crate::extract::extractor::RecordExtractor;
use crate::extract::images::{ImageResolver, DECORATIVE_MARKERS};
use crate::extract::links::LinkDiscovery;
use crate::extract::strategy::{FieldChain, ItemList, SelectorResolver};
use crate::extract::ExtractionError;
use crate::state::Label;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Record fields that are located through strategy chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Field {
    FullAddress,
    Price,
    PropertyType,
    Bedrooms,
    Bathrooms,
    ParkingSpaces,
    LandSize,
    BuildingSize,
    /// "Suburb, STATE POSTCODE" line shown apart from a street-only heading
    Location,
    PropertyStatus,
    Description,
    Agent,
    AgencyName,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::FullAddress,
        Field::Price,
        Field::PropertyType,
        Field::Bedrooms,
        Field::Bathrooms,
        Field::ParkingSpaces,
        Field::LandSize,
        Field::BuildingSize,
        Field::Location,
        Field::PropertyStatus,
        Field::Description,
        Field::Agent,
        Field::AgencyName,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::FullAddress => "full-address",
            Field::Price => "price",
            Field::PropertyType => "property-type",
            Field::Bedrooms => "bedrooms",
            Field::Bathrooms => "bathrooms",
            Field::ParkingSpaces => "parking-spaces",
            Field::LandSize => "land-size",
            Field::BuildingSize => "building-size",
            Field::Location => "location",
            Field::PropertyStatus => "property-status",
            Field::Description => "description",
            Field::Agent => "agent",
            Field::AgencyName => "agency-name",
        }
    }
}

/// One location strategy as written in a profile
///
/// - `css` alone: trimmed text (or `attr` value) of the first matching element
/// - `css` + `contains`: first matching element whose text contains the keyword
/// - `css` + `pattern`: first matching element whose text matches; capture 1 wins
/// - `pattern` alone: matched against the page's visible body text
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StrategySpec {
    pub name: String,
    #[serde(default)]
    pub css: Option<String>,
    #[serde(default)]
    pub attr: Option<String>,
    #[serde(default)]
    pub contains: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
}

impl StrategySpec {
    pub fn css(name: &str, css: &str) -> Self {
        Self {
            name: name.to_string(),
            css: Some(css.to_string()),
            attr: None,
            contains: None,
            pattern: None,
        }
    }

    pub fn css_containing(name: &str, css: &str, keyword: &str) -> Self {
        Self {
            contains: Some(keyword.to_string()),
            ..Self::css(name, css)
        }
    }

    pub fn css_matching(name: &str, css: &str, pattern: &str) -> Self {
        Self {
            pattern: Some(pattern.to_string()),
            ..Self::css(name, css)
        }
    }

    pub fn body_pattern(name: &str, pattern: &str) -> Self {
        Self {
            name: name.to_string(),
            css: None,
            attr: None,
            contains: None,
            pattern: Some(pattern.to_string()),
        }
    }
}

/// Rule for discovering listing links on a search results page
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LinkRuleSpec {
    pub name: String,
    /// Anchor selector; the `href` attribute is read
    pub css: String,
    /// Regex the resolved absolute URL must match
    #[serde(default)]
    pub require: Option<String>,
    /// Substring that disqualifies a resolved URL
    #[serde(default)]
    pub exclude: Option<String>,
}

/// Image discovery and filtering rules
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImageSpec {
    /// Substring (usually a host) required of URLs found in img/srcset/script sources
    #[serde(default)]
    pub host_marker: Option<String>,

    /// Regex the image filename must match; set when a site mixes in unrelated imagery
    #[serde(default)]
    pub listing_id_pattern: Option<String>,

    /// Attributes holding JSON arrays or comma-separated image URLs
    #[serde(default = "default_data_attributes")]
    pub data_attributes: Vec<String>,

    #[serde(default = "default_decorative_markers")]
    pub decorative_markers: Vec<String>,
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self {
            host_marker: None,
            listing_id_pattern: None,
            data_attributes: default_data_attributes(),
            decorative_markers: default_decorative_markers(),
        }
    }
}

fn default_data_attributes() -> Vec<String> {
    vec![
        "data-images".to_string(),
        "data-gallery".to_string(),
        "data-photos".to_string(),
    ]
}

fn default_decorative_markers() -> Vec<String> {
    DECORATIVE_MARKERS.iter().map(|m| m.to_string()).collect()
}

/// Full extraction profile for one target site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    pub name: String,

    /// Search endpoint with a `{query}` (URL-encoded) or `{slug}` placeholder
    pub search_url_template: String,

    /// Label given to requests built from seed addresses
    pub address_label: Label,

    pub fields: BTreeMap<Field, Vec<StrategySpec>>,

    pub links: Vec<LinkRuleSpec>,

    pub images: ImageSpec,

    /// Selectors for feature-list items ("Air conditioning", "Pool", ...)
    pub feature_list: Vec<String>,

    /// Regex with one capture group applied to the URL path; None means trailing digits
    pub listing_id_pattern: Option<String>,
}

/// A profile with every selector and pattern compiled
pub struct CompiledProfile {
    pub extractor: RecordExtractor,
    pub links: LinkDiscovery,
}

impl SiteProfile {
    /// Looks up a built-in profile by name
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "domain" => Some(Self::domain()),
            "realestate" => Some(Self::realestate()),
            _ => None,
        }
    }

    /// Profile for domain.com.au: search by street, extract from listing pages
    pub fn domain() -> Self {
        let mut fields = BTreeMap::new();

        fields.insert(
            Field::FullAddress,
            vec![
                StrategySpec::css(
                    "copy-wrapper-h1",
                    r#"[data-testid="listing-details__button-copy-wrapper"] h1"#,
                ),
                StrategySpec::css("legacy-address-class", ".css-hkh81z"),
                StrategySpec::css("generic-h1", "h1"),
            ],
        );
        fields.insert(
            Field::Price,
            vec![
                StrategySpec::css(
                    "summary-title",
                    r#"[data-testid="listing-details__summary-title"] span"#,
                ),
                StrategySpec::css("legacy-price-class", ".css-twgrok span"),
            ],
        );
        fields.insert(
            Field::PropertyType,
            vec![
                StrategySpec::css(
                    "summary-property-type",
                    r#"[data-testid="listing-summary-property-type"] span"#,
                ),
                StrategySpec::css("legacy-type-class", ".css-1efi8gv"),
            ],
        );
        fields.insert(
            Field::Bedrooms,
            feature_chain("Beds", r"(?i)(\d+)\s*(?:beds?|bedrooms?)\b"),
        );
        fields.insert(
            Field::Bathrooms,
            feature_chain("Baths", r"(?i)(\d+)\s*(?:baths?|bathrooms?)\b"),
        );
        fields.insert(
            Field::ParkingSpaces,
            feature_chain("Parking", r"(?i)(\d+)\s*(?:parking|cars?|garages?)\b"),
        );
        fields.insert(
            Field::LandSize,
            vec![
                StrategySpec::css_containing(
                    "feature-area",
                    r#"[data-testid="property-features-text-container"]"#,
                    "m²",
                ),
                StrategySpec::body_pattern("body-land", LAND_PATTERN),
            ],
        );
        fields.insert(
            Field::BuildingSize,
            vec![StrategySpec::body_pattern("body-building", BUILDING_PATTERN)],
        );
        fields.insert(
            Field::PropertyStatus,
            vec![StrategySpec::css(
                "listing-tag",
                r#"[data-testid="listing-details__listing-tag"]"#,
            )],
        );
        insert_listing_details(
            &mut fields,
            r#"[data-testid="listing-details__description"]"#,
            r#"[data-testid="listing-details__agent-details-agent-name"]"#,
        );

        Self {
            name: "domain".to_string(),
            search_url_template: "https://www.domain.com.au/sale/?excludeunderoffer=1&street={query}"
                .to_string(),
            address_label: Label::Search,
            fields,
            links: vec![
                LinkRuleSpec {
                    name: "address-anchor".to_string(),
                    css: "a.address[href]".to_string(),
                    require: Some(r"^https://www\.domain\.com\.au/".to_string()),
                    exclude: None,
                },
                LinkRuleSpec {
                    name: "listing-slug".to_string(),
                    css: "a[href]".to_string(),
                    require: Some(r"^https://www\.domain\.com\.au/[a-z0-9-]+-\d+$".to_string()),
                    exclude: Some("/sale/".to_string()),
                },
            ],
            images: ImageSpec {
                host_marker: Some("domain.com.au".to_string()),
                ..ImageSpec::default()
            },
            feature_list: vec![
                r#"[data-testid="listing-details__additional-features-listing"] li"#.to_string(),
                GENERIC_FEATURE_ITEMS.to_string(),
            ],
            listing_id_pattern: None,
        }
    }

    /// Profile for realestate.com.au: addresses map straight to property pages
    pub fn realestate() -> Self {
        let mut fields = BTreeMap::new();

        fields.insert(
            Field::FullAddress,
            vec![
                StrategySpec::css("address-testid", r#"[data-testid="address"]"#),
                StrategySpec::css("address-title", "h1.address-attributes__AddressTitle-sc-labpnz-2"),
                StrategySpec::css("info-address", "h1.property-info-address"),
                StrategySpec::css("street-address", ".property-info__street-address"),
                StrategySpec::css("generic-h1", "h1"),
            ],
        );
        fields.insert(
            Field::Price,
            vec![
                StrategySpec::css("price-testid", r#"[data-testid="price"]"#),
                StrategySpec::css("display-price", r#"[data-testid="displayPrice"]"#),
                StrategySpec::css("info-price", ".property-info__price"),
                StrategySpec::css("legacy-price", ".property-price"),
            ],
        );
        fields.insert(
            Field::PropertyType,
            vec![
                StrategySpec::css("type-testid", r#"[data-testid="property-type"]"#),
                StrategySpec::css("info-type", ".property-info__property-type"),
            ],
        );

        const FEATURES: &str = r#"[data-testid="property-features"] span, .property-info__features span, .property-features span, .property-features__feature"#;
        for (field, pattern) in [
            (Field::Bedrooms, r"(?i)(\d+)\s*(?:bed|bedroom)"),
            (Field::Bathrooms, r"(?i)(\d+)\s*(?:bath|bathroom)"),
            (Field::ParkingSpaces, r"(?i)(\d+)\s*(?:car|parking|garage)"),
        ] {
            fields.insert(
                field,
                vec![
                    StrategySpec::css_matching("feature-span", FEATURES, pattern),
                    StrategySpec::body_pattern("body-text", pattern),
                ],
            );
        }

        fields.insert(
            Field::LandSize,
            vec![StrategySpec::body_pattern("body-land", LAND_PATTERN)],
        );
        fields.insert(
            Field::BuildingSize,
            vec![StrategySpec::body_pattern("body-building", BUILDING_PATTERN)],
        );
        fields.insert(
            Field::Location,
            vec![StrategySpec::css(
                "address-attributes",
                ".address-attributes__AddressAttributesContainer-sc-labpnz-0 p",
            )],
        );
        fields.insert(
            Field::PropertyStatus,
            vec![StrategySpec::css("status-content", ".styles__Content-sc-1cced9e-1")],
        );
        insert_listing_details(
            &mut fields,
            r#"[data-testid="description"]"#,
            r#"[data-testid="agent-name"]"#,
        );

        Self {
            name: "realestate".to_string(),
            search_url_template: "https://www.realestate.com.au/property/{slug}".to_string(),
            address_label: Label::Property,
            fields,
            links: vec![LinkRuleSpec {
                name: "listing-anchor".to_string(),
                css: "a[href]".to_string(),
                require: Some(
                    r"^https://www\.realestate\.com\.au/property-[a-z+]+-[a-z]+-[a-z0-9+-]+-\d+$"
                        .to_string(),
                ),
                exclude: None,
            }],
            images: ImageSpec::default(),
            feature_list: vec![GENERIC_FEATURE_ITEMS.to_string()],
            listing_id_pattern: Some(r"/property-[a-z+]+-[a-z]+-[a-z0-9+-]+-(\d+)$".to_string()),
        }
    }

    /// Compiles every selector and pattern in the profile
    ///
    /// # Returns
    ///
    /// * `Err(ExtractionError)` - A selector or pattern is invalid, or a strategy is empty
    pub fn compile(&self) -> Result<CompiledProfile, ExtractionError> {
        let mut resolver = SelectorResolver::new();
        for (field, specs) in &self.fields {
            let mut chain = FieldChain::new(*field);
            for spec in specs {
                chain.push(spec.compile()?);
            }
            resolver.insert(chain);
        }

        let images = ImageResolver::from_spec(&self.images)?;

        let listing_id = self
            .listing_id_pattern
            .as_deref()
            .map(|p| compile_pattern("listing-id", p))
            .transpose()?;

        let features = ItemList::from_selectors("feature-list", &self.feature_list)?;

        Ok(CompiledProfile {
            extractor: RecordExtractor::new(resolver, images, listing_id).with_features(features),
            links: LinkDiscovery::from_specs(&self.links)?,
        })
    }
}

/// Feature-list items as marked up on most listing templates
const GENERIC_FEATURE_ITEMS: &str =
    r#".property-features-list li, .features-list li, [data-testid="features"] li"#;

/// Description, agent and agency chains: site-specific selector first, then
/// the class and microdata names shared by most listing templates
fn insert_listing_details(
    fields: &mut BTreeMap<Field, Vec<StrategySpec>>,
    description: &str,
    agent: &str,
) {
    fields.insert(
        Field::Description,
        vec![
            StrategySpec::css("description-testid", description),
            StrategySpec::css("description-class", ".property-description"),
            StrategySpec::css("description-itemprop", r#"[itemprop="description"]"#),
        ],
    );
    fields.insert(
        Field::Agent,
        vec![
            StrategySpec::css("agent-testid", agent),
            StrategySpec::css("agent-class", ".agent-name"),
        ],
    );
    fields.insert(
        Field::AgencyName,
        vec![
            StrategySpec::css("agency-testid", r#"[data-testid="agency-name"]"#),
            StrategySpec::css("agency-class", ".agency-name"),
        ],
    );
}

/// Pattern over body text for land area, e.g. "Land size: 650 m²"
const LAND_PATTERN: &str = r"(?i)land[^0-9]{0,40}?(\d[\d,]*)\s*m[²2]";

/// Pattern over body text for building area
const BUILDING_PATTERN: &str = r"(?i)building[^0-9]{0,40}?(\d[\d,]*)\s*m[²2]";

/// Keyword-anchored feature tile, then a generic body-text fallback
fn feature_chain(keyword: &str, body_pattern: &str) -> Vec<StrategySpec> {
    vec![
        StrategySpec::css_containing(
            "feature-testid",
            r#"[data-testid="property-features-feature"]"#,
            keyword,
        ),
        StrategySpec::css_matching(
            "feature-wrapper-span",
            r#"[data-testid="property-features-wrapper"] span"#,
            body_pattern,
        ),
        StrategySpec::body_pattern("body-text", body_pattern),
    ]
}

pub(crate) fn compile_pattern(rule: &str, pattern: &str) -> Result<Regex, ExtractionError> {
    Regex::new(pattern).map_err(|e| ExtractionError::InvalidPattern {
        rule: rule.to_string(),
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}
