pub mod keys;

use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use motion_monitor_common::frame::Frame;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::sink::{CaptureRecord, CaptureSink};

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("failed to create output directory {0}: {1}")]
    Directory(String, std::io::Error),
    #[error("failed to encode frame as JPEG: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to write {0}: {1}")]
    Write(String, std::io::Error),
}

/// Decides whether a scored frame becomes a snapshot on disk.
///
/// Frames scoring strictly above `movement_threshold` are written as JPEG
/// under `output_dir` and reported to the capture sink. Save failures are
/// logged and swallowed so the capture loop keeps running.
pub struct PersistencePolicy {
    movement_threshold: f64,
    output_dir: PathBuf,
    jpeg_quality: u8,
    sink: Box<dyn CaptureSink>,
}

impl PersistencePolicy {
    /// Create the policy, creating `output_dir` if it does not exist.
    pub fn new(
        movement_threshold: f64,
        output_dir: PathBuf,
        jpeg_quality: u8,
        sink: Box<dyn CaptureSink>,
    ) -> Result<Self, SaveError> {
        ensure_dir(&output_dir)?;
        info!(
            output_dir = output_dir.display().to_string(),
            movement_threshold,
            jpeg_quality,
            sink = sink.name(),
            "persistence ready"
        );
        Ok(Self {
            movement_threshold,
            output_dir,
            jpeg_quality,
            sink,
        })
    }

    #[allow(dead_code)]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Save `frame` if `score` exceeds the threshold. Returns the written path.
    pub async fn maybe_save(
        &mut self,
        score: f64,
        frame: &Frame,
        now: DateTime<Local>,
    ) -> Option<PathBuf> {
        if score <= self.movement_threshold {
            return None;
        }

        let ts = keys::fmt_ts(&now);
        info!("Movement detected at {ts} with level: {score}");

        let path = keys::snapshot_path(&self.output_dir, &now);
        if let Err(e) = self.save(frame, &path).await {
            error!(error = %e, path = path.display().to_string(), seq = frame.seq, "error saving frame");
            return None;
        }
        info!(path = path.display().to_string(), "Frame saved at {}", path.display());

        let record = CaptureRecord {
            captured_at: now,
            movement_level: score,
            frame_path: path.clone(),
        };
        if let Err(e) = self.sink.record(&record) {
            warn!(error = %e, sink = self.sink.name(), path = path.display().to_string(), "failed to record capture");
        }

        Some(path)
    }

    async fn save(&self, frame: &Frame, path: &Path) -> Result<(), SaveError> {
        // The directory may have been removed since startup.
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| SaveError::Directory(self.output_dir.display().to_string(), e))?;

        let mut jpeg = Vec::new();
        frame
            .pixels
            .write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, self.jpeg_quality))?;

        tokio::fs::write(path, &jpeg)
            .await
            .map_err(|e| SaveError::Write(path.display().to_string(), e))?;
        debug!(path = path.display().to_string(), bytes = jpeg.len(), "wrote snapshot");
        Ok(())
    }
}

fn ensure_dir(dir: &Path) -> Result<(), SaveError> {
    std::fs::create_dir_all(dir).map_err(|e| SaveError::Directory(dir.display().to_string(), e))
}
