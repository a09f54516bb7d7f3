use chrono::{DateTime, Local};
use std::path::PathBuf;

/// One saved detection, handed to the capture sink after the image is on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRecord {
    pub captured_at: DateTime<Local>,
    pub movement_level: f64,
    pub frame_path: PathBuf,
}

/// Destination for capture records.
///
/// Called only after a snapshot was written successfully. Failures are the
/// caller's to log; they never affect the saved image.
pub trait CaptureSink: Send {
    fn record(&mut self, record: &CaptureRecord) -> Result<(), SinkError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Sink that discards every record.
#[derive(Debug, Default)]
pub struct NoopSink;

impl CaptureSink for NoopSink {
    fn record(&mut self, _record: &CaptureRecord) -> Result<(), SinkError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to prepare database directory {0}: {1}")]
    Directory(String, std::io::Error),
}
