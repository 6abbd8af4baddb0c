//! In-memory sink, shared between clones so tests can inspect what a run wrote

use crate::extract::PropertyRecord;
use crate::output::traits::{OutputError, OutputResult, RecordSink};
use std::sync::{Arc, Mutex};

/// Sink that keeps records in memory
///
/// Cloning the sink shares its storage, so a caller can hand one clone to the
/// coordinator and read the records back from another.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<PropertyRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far
    pub fn records(&self) -> Vec<PropertyRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, record: &PropertyRecord) -> OutputResult<()> {
        self.records
            .lock()
            .map_err(|e| OutputError::Lock(e.to_string()))?
            .push(record.clone());
        Ok(())
    }

    fn finalize(&mut self) -> OutputResult<()> {
        Ok(())
    }
}
