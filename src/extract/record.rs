//! The output record of a listing page, or of a request that failed
//!
//! One shape covers both. Error records fill only `url`, `scrapedAt`, `error`
//! and, when known, `originalAddress`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One output row: a listing, or the failure to obtain one
///
/// Serialized with camelCase keys. Missing values are written as `null` so
/// every record has the same shape; only `originalAddress` and `error` are
/// omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub url: String,
    pub scraped_at: DateTime<Utc>,

    pub address: Option<String>,
    pub suburb: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub full_address: Option<String>,

    /// Sale status banner, e.g. "Under contract"
    pub property_status: Option<String>,

    pub price: Option<i64>,
    pub price_text: Option<String>,

    pub property_type: Option<String>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub parking_spaces: Option<u32>,
    pub land_size: Option<u32>,
    pub building_size: Option<u32>,

    pub description: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    pub agent: Option<String>,
    pub agency_name: Option<String>,

    pub listing_id: Option<String>,
    pub images: Vec<String>,
    pub image_count: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PropertyRecord {
    /// An empty record for `url`, stamped now
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            scraped_at: Utc::now(),
            address: None,
            suburb: None,
            state: None,
            postcode: None,
            full_address: None,
            property_status: None,
            price: None,
            price_text: None,
            property_type: None,
            bedrooms: None,
            bathrooms: None,
            parking_spaces: None,
            land_size: None,
            building_size: None,
            description: None,
            features: Vec::new(),
            agent: None,
            agency_name: None,
            listing_id: None,
            images: Vec::new(),
            image_count: 0,
            original_address: None,
            error: None,
        }
    }

    /// The error-shaped record emitted for a request that could not produce a listing
    pub fn failed(
        url: impl Into<String>,
        error: impl Into<String>,
        original_address: Option<String>,
    ) -> Self {
        Self {
            error: Some(error.into()),
            original_address,
            ..Self::new(url)
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
