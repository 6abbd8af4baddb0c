//! JSON-lines sink: one record per line, appended to a file

use crate::extract::PropertyRecord;
use crate::output::traits::{OutputError, OutputResult, RecordSink};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct JsonLinesSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    written: usize,
}

impl JsonLinesSink {
    /// Opens `path` for appending, creating it and missing parent directories
    pub fn open(path: &Path) -> OutputResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written by this sink
    pub fn written(&self) -> usize {
        self.written
    }
}

impl RecordSink for JsonLinesSink {
    fn append(&mut self, record: &PropertyRecord) -> OutputResult<()> {
        let writer = self.writer.as_mut().ok_or(OutputError::Finalized)?;

        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
        // Flushed per record so a crash loses at most the line in flight
        writer.flush()?;

        self.written += 1;
        Ok(())
    }

    fn finalize(&mut self) -> OutputResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            tracing::info!("Wrote {} records to {}", self.written, self.path.display());
        }
        Ok(())
    }
}
