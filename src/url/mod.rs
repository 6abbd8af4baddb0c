//! URL handling module for Listing-Harvest
//!
//! Normalization gives every discovered link a canonical form so duplicate
//! listing links on a search page collapse to one request, and relative
//! hrefs are resolved against the page they were found on.

mod normalize;

pub use normalize::{normalize_url, resolve_href};
