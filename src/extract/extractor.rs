//! Record Extractor: one listing page in, one [`PropertyRecord`] out
//!
//! Every field is located through its strategy chain and then parsed. A field
//! that cannot be found stays empty; only a blank page is an error.

use crate::extract::document::PageDocument;
use crate::extract::fields::{
    listing_id_from_url, parse_address, parse_area, parse_count, parse_locality, parse_price,
    AddressParts,
};
use crate::extract::images::ImageResolver;
use crate::extract::profile::Field;
use crate::extract::record::PropertyRecord;
use crate::extract::strategy::{ItemList, SelectorResolver};
use crate::extract::ExtractionError;
use regex::Regex;

/// Turns a listing page into a [`PropertyRecord`]
pub struct RecordExtractor {
    resolver: SelectorResolver,
    images: ImageResolver,
    features: ItemList,
    listing_id: Option<Regex>,
}

impl RecordExtractor {
    pub fn new(resolver: SelectorResolver, images: ImageResolver, listing_id: Option<Regex>) -> Self {
        Self {
            resolver,
            images,
            features: ItemList::default(),
            listing_id,
        }
    }

    /// Sets the selectors for the feature list
    pub fn with_features(mut self, features: ItemList) -> Self {
        self.features = features;
        self
    }

    /// Extracts every field it can find
    ///
    /// Missing fields are left as `None`. Fails only when there is no page to
    /// extract from.
    pub fn try_extract(&self, page: &PageDocument) -> Result<PropertyRecord, ExtractionError> {
        if page.is_blank() {
            return Err(ExtractionError::EmptyDocument {
                url: page.url().to_string(),
            });
        }

        let mut record = PropertyRecord::new(page.url().as_str());

        if let Some(full) = self.resolver.resolve_value(Field::FullAddress, page) {
            let mut parts = parse_address(&full);
            let mut full_address = full;

            if let Some(locality) = self
                .resolver
                .resolve_value(Field::Location, page)
                .map(|text| parse_locality(&text))
            {
                if parts.address.is_none() {
                    // Street-only heading
                    parts = AddressParts {
                        address: Some(full_address.clone()),
                        ..locality
                    };
                    if let Some(joined) = parts.to_full_address() {
                        full_address = joined;
                    }
                } else {
                    parts.suburb = parts.suburb.or(locality.suburb);
                    parts.state = parts.state.or(locality.state);
                    parts.postcode = parts.postcode.or(locality.postcode);
                }
            }

            record.address = parts.address;
            record.suburb = parts.suburb;
            record.state = parts.state;
            record.postcode = parts.postcode;
            record.full_address = Some(full_address);
        }

        record.property_status = self.resolver.resolve_value(Field::PropertyStatus, page);

        if let Some(text) = self.resolver.resolve_value(Field::Price, page) {
            record.price = parse_price(&text);
            record.price_text = Some(text);
        }

        record.property_type = self.resolver.resolve_value(Field::PropertyType, page);

        let count = |field| {
            self.resolver
                .resolve_value(field, page)
                .and_then(|text| parse_count(&text))
        };
        record.bedrooms = count(Field::Bedrooms);
        record.bathrooms = count(Field::Bathrooms);
        record.parking_spaces = count(Field::ParkingSpaces);

        let area = |field| {
            self.resolver
                .resolve_value(field, page)
                .and_then(|text| parse_area(&text))
        };
        record.land_size = area(Field::LandSize);
        record.building_size = area(Field::BuildingSize);

        record.description = self.resolver.resolve_value(Field::Description, page);
        record.features = self.features.collect(page);
        record.agent = self.resolver.resolve_value(Field::Agent, page);
        record.agency_name = self.resolver.resolve_value(Field::AgencyName, page);

        record.listing_id = listing_id_from_url(page.url(), self.listing_id.as_ref());

        let images = self.images.resolve_page(page);
        if images.count > 0 {
            tracing::info!("Found {} images", images.count);
        } else {
            tracing::warn!(
                "No images found on {} - page structure may have changed",
                page.url()
            );
        }
        record.images = images.urls;
        record.image_count = images.count;

        Ok(record)
    }

    /// Total form of [`RecordExtractor::try_extract`]: failures become error records
    pub fn extract(&self, page: &PageDocument) -> PropertyRecord {
        match self.try_extract(page) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Extraction failed for {}: {}", page.url(), e);
                PropertyRecord::failed(page.url().as_str(), e.to_string(), None)
            }
        }
    }
}
