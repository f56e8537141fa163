use std::fs::File;
use std::io::{LineWriter, Write};
use std::path::Path;

use sift_core::feedback::{FeedbackRecord, FeedbackSink, SinkError};

/// Writes each feedback record as one JSON line.
pub struct JsonLinesSink {
    writer: LineWriter<File>,
}

impl JsonLinesSink {
    pub fn create(path: &Path) -> Result<Self, String> {
        let file = File::create(path).map_err(|e| format!("Failed to create '{}': {}", path.display(), e))?;
        Ok(Self {
            writer: LineWriter::new(file),
        })
    }
}

impl FeedbackSink for JsonLinesSink {
    fn submit(&mut self, record: &FeedbackRecord) -> Result<(), SinkError> {
        let line = serde_json::to_string(record).map_err(|e| SinkError::Rejected(e.to_string()))?;
        writeln!(self.writer, "{}", line).map_err(|e| SinkError::Rejected(e.to_string()))
    }
}
