//! Run statistics
//!
//! Counters kept by the coordinator while a run progresses, reported once at
//! the end.

use serde::Serialize;

/// Run summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// First attempts charged to the request budget
    pub requests_issued: u64,

    /// Records written to the sink (listings and error records)
    pub records_emitted: u64,

    /// Error-shaped records among those emitted
    pub error_records: u64,

    /// Responses recognized as block pages
    pub blocked: u64,

    /// Attempts re-queued after a failure
    pub retries: u64,

    /// PROPERTY requests created from search pages
    pub links_enqueued: u64,

    /// Requests dropped because their URL was already seen
    pub duplicates: u64,

    /// Requests dropped because the budget was spent
    pub budget_rejected: u64,

    /// Search pages without links and listings without images
    pub drift_warnings: u64,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listing records that are not error records
    pub fn listings(&self) -> u64 {
        self.records_emitted.saturating_sub(self.error_records)
    }

    /// Returns the share of emitted records that are listings, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.records_emitted == 0 {
            return 0.0;
        }
        (self.listings() as f64 / self.records_emitted as f64) * 100.0
    }

    /// Logs the summary through tracing
    pub fn log(&self) {
        tracing::info!(
            "Run finished: {} requests, {} records ({} listings, {} errors)",
            self.requests_issued,
            self.records_emitted,
            self.listings(),
            self.error_records
        );
        tracing::info!(
            "Blocked: {}, retries: {}, links enqueued: {}, duplicates: {}, over budget: {}, drift warnings: {}",
            self.blocked,
            self.retries,
            self.links_enqueued,
            self.duplicates,
            self.budget_rejected,
            self.drift_warnings
        );
    }
}

/// Prints a summary to stdout in a formatted manner
pub fn print_summary(summary: &RunSummary) {
    println!("=== Run Summary ===\n");

    println!("Requests:");
    println!("  Issued: {}", summary.requests_issued);
    println!("  Retries: {}", summary.retries);
    println!("  Blocked responses: {}", summary.blocked);
    println!("  Rejected over budget: {}", summary.budget_rejected);
    println!();

    println!("Discovery:");
    println!("  Listing links enqueued: {}", summary.links_enqueued);
    println!("  Duplicate URLs skipped: {}", summary.duplicates);
    println!("  Structural drift warnings: {}", summary.drift_warnings);
    println!();

    println!(
        "Records: {} ({} listings, {} errors, {:.1}% success)",
        summary.records_emitted,
        summary.listings(),
        summary.error_records,
        summary.success_rate()
    );
}
