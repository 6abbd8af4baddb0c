//! Page to record extraction
//!
//! This module turns a fetched page into either a [`PropertyRecord`] (listing
//! pages) or a list of listing URLs (search pages). Everything here is
//! synchronous: a [`PageDocument`] is parsed, used and dropped without ever
//! crossing an await point.

mod document;
mod extractor;
pub mod fields;
mod images;
mod links;
mod profile;
mod record;
mod strategy;

pub use document::{collapse_whitespace, element_text, PageDocument};
pub use extractor::RecordExtractor;
pub use fields::{
    listing_id_from_url, parse_address, parse_area, parse_count, parse_locality, parse_price,
    AddressParts,
};
pub use images::{
    CandidateSet, ImageFilter, ImageResolver, NormalizedSet, ResolvedImages, DECORATIVE_MARKERS,
};
pub use links::LinkDiscovery;
pub use profile::{CompiledProfile, Field, ImageSpec, LinkRuleSpec, SiteProfile, StrategySpec};
pub use record::PropertyRecord;
pub use strategy::{
    CssStrategy, FieldChain, FnStrategy, ItemList, LocateStrategy, Located, PatternStrategy,
    SelectorResolver,
};

use thiserror::Error;

/// Errors raised while compiling rules or extracting a record
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("rule '{rule}': invalid selector '{selector}': {message}")]
    InvalidSelector {
        rule: String,
        selector: String,
        message: String,
    },

    #[error("rule '{rule}': invalid pattern '{pattern}': {message}")]
    InvalidPattern {
        rule: String,
        pattern: String,
        message: String,
    },

    #[error("rule '{rule}' has neither a selector nor a pattern")]
    EmptyRule { rule: String },

    #[error("empty document at {url}")]
    EmptyDocument { url: String },
}
