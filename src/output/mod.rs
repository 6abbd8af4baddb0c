//! Output module for emitted records and run reporting
//!
//! This module handles:
//! - The record sink contract
//! - JSON-lines, SQLite and in-memory sinks
//! - Run summary statistics

mod jsonl;
mod memory;
mod sqlite_output;
pub mod stats;
mod traits;

pub use jsonl::JsonLinesSink;
pub use memory::MemorySink;
pub use sqlite_output::SqliteSink;
pub use stats::{print_summary, RunSummary};
pub use traits::{OutputError, OutputResult, RecordSink};

use crate::config::{OutputConfig, OutputFormat};
use std::path::{Path, PathBuf};

/// Opens the sink selected by the output configuration
///
/// # Arguments
///
/// * `config` - Output format and destination
/// * `path_override` - Destination replacing the configured path
///
/// # Returns
///
/// * `Ok(Box<dyn RecordSink>)` - Sink ready for appends
/// * `Err(OutputError)` - The destination could not be opened
pub fn build_sink(
    config: &OutputConfig,
    path_override: Option<&Path>,
) -> OutputResult<Box<dyn RecordSink>> {
    let path = path_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.path));

    tracing::info!("Writing {:?} output to {}", config.format, path.display());

    match config.format {
        OutputFormat::Jsonl => Ok(Box::new(JsonLinesSink::open(&path)?)),
        OutputFormat::Sqlite => Ok(Box::new(SqliteSink::open(&path)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::PropertyRecord;
    use tempfile::TempDir;

    #[test]
    fn test_build_jsonl_sink() {
        let dir = TempDir::new().unwrap();
        let config = OutputConfig {
            format: OutputFormat::Jsonl,
            path: dir.path().join("out.jsonl").display().to_string(),
        };

        let mut sink = build_sink(&config, None).unwrap();
        sink.append(&PropertyRecord::new("https://example.com/listing-1"))
            .unwrap();
        sink.finalize().unwrap();

        assert!(dir.path().join("out.jsonl").exists());
    }

    #[test]
    fn test_build_sqlite_sink_with_override() {
        let dir = TempDir::new().unwrap();
        let config = OutputConfig {
            format: OutputFormat::Sqlite,
            path: "unused.db".to_string(),
        };
        let target = dir.path().join("override.db");

        let mut sink = build_sink(&config, Some(&target)).unwrap();
        sink.finalize().unwrap();

        assert!(target.exists());
        assert!(!Path::new("unused.db").exists());
    }
}
