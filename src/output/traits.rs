//! Record sink trait and output errors
//!
//! A sink receives every record the crawler emits, in processing order.
//! Sinks are append-only; a failing sink stops the run because records that
//! cannot be stored would otherwise be lost silently.

use crate::extract::PropertyRecord;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Sink already finalized")]
    Finalized,

    #[error("Failed to lock sink: {0}")]
    Lock(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Append-only destination for property records
pub trait RecordSink: Send {
    /// Stores one record
    fn append(&mut self, record: &PropertyRecord) -> OutputResult<()>;

    /// Flushes and closes the sink; further appends fail
    fn finalize(&mut self) -> OutputResult<()>;
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn append(&mut self, record: &PropertyRecord) -> OutputResult<()> {
        (**self).append(record)
    }

    fn finalize(&mut self) -> OutputResult<()> {
        (**self).finalize()
    }
}
