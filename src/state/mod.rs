//! Request state tracking
//!
//! This module provides:
//! - `CrawlRequest`: a unit of crawl work with its retry counter
//! - `RequestKind`: SEARCH vs PROPERTY payloads as a tagged variant
//! - `RequestState`: the per-request lifecycle with validated transitions

mod request;
mod request_state;

pub use request::{CrawlRequest, Label, RequestKind};
pub use request_state::RequestState;
