use chrono::Utc;
use motion_monitor_common::frame::Frame;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{conform, FrameSource, SourceError};

const EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Replays still images from a directory in lexicographic filename order.
///
/// Useful for running the detector offline against previously captured
/// frames. Once every image has been served, `capture` fails with
/// `SourceError::Exhausted`.
pub struct ReplaySource {
    directory: PathBuf,
    width: u32,
    height: u32,
    pending: VecDeque<PathBuf>,
    started: bool,
    seq: u64,
}

impl ReplaySource {
    pub fn new(directory: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            directory: directory.into(),
            width,
            height,
            pending: VecDeque::new(),
            started: false,
            seq: 0,
        }
    }

    #[allow(dead_code)]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ReplaySource {
    async fn start(&mut self) -> Result<(), SourceError> {
        let dir_str = self.directory.display().to_string();
        let mut entries = tokio::fs::read_dir(&self.directory)
            .await
            .map_err(|e| SourceError::Io(dir_str.clone(), e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SourceError::Io(dir_str.clone(), e))?
        {
            let path = entry.path();
            if path.is_file() && is_image(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(SourceError::EmptyDirectory(dir_str));
        }
        files.sort();

        info!(directory = dir_str, frames = files.len(), "replay source started");
        self.pending = files.into();
        self.started = true;
        Ok(())
    }

    async fn capture(&mut self) -> Result<Frame, SourceError> {
        if !self.started {
            return Err(SourceError::NotStarted);
        }
        let path = self
            .pending
            .pop_front()
            .ok_or_else(|| SourceError::Exhausted(self.directory.display().to_string()))?;

        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| SourceError::Io(path.display().to_string(), e))?;

        let seq = self.seq;
        self.seq += 1;
        let frame = Frame::decode(&data, Utc::now().timestamp_millis(), seq)?;
        debug!(seq, path = path.display().to_string(), "replayed frame");
        Ok(conform(frame, self.width, self.height))
    }

    async fn stop(&mut self) {
        if self.started {
            self.started = false;
            self.pending.clear();
            info!(directory = self.directory.display().to_string(), "replay source stopped");
        }
    }

    fn name(&self) -> &str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, level: u8) {
        RgbImage::from_pixel(8, 6, Rgb([level, level, level]))
            .save(dir.join(name))
            .unwrap();
    }

    #[tokio::test]
    async fn replays_in_filename_order_then_exhausts() {
        let tmp = TempDir::new().unwrap();
        write_png(tmp.path(), "frame_002.png", 20);
        write_png(tmp.path(), "frame_001.png", 10);
        write_png(tmp.path(), "frame_003.png", 30);
        std::fs::write(tmp.path().join("notes.txt"), b"ignored").unwrap();

        let mut source = ReplaySource::new(tmp.path(), 8, 6);
        source.start().await.unwrap();
        assert_eq!(source.remaining(), 3);

        let levels: Vec<u8> = [
            source.capture().await.unwrap(),
            source.capture().await.unwrap(),
            source.capture().await.unwrap(),
        ]
        .iter()
        .map(|f| f.pixels.get_pixel(0, 0).0[0])
        .collect();
        assert_eq!(levels, vec![10, 20, 30]);

        assert!(matches!(source.capture().await, Err(SourceError::Exhausted(_))));
    }

    #[tokio::test]
    async fn empty_directory_fails_start() {
        let tmp = TempDir::new().unwrap();
        let mut source = ReplaySource::new(tmp.path(), 8, 6);
        assert!(matches!(
            source.start().await,
            Err(SourceError::EmptyDirectory(_))
        ));
    }

    #[tokio::test]
    async fn missing_directory_fails_start() {
        let mut source = ReplaySource::new("/nonexistent/replay", 8, 6);
        assert!(matches!(source.start().await, Err(SourceError::Io(..))));
    }

    #[tokio::test]
    async fn frames_are_conformed_and_stop_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        write_png(tmp.path(), "a.png", 50);

        let mut source = ReplaySource::new(tmp.path(), 4, 3);
        source.start().await.unwrap();
        assert_eq!(source.capture().await.unwrap().dimensions(), (4, 3));

        source.stop().await;
        source.stop().await;
        assert!(matches!(source.capture().await, Err(SourceError::NotStarted)));
    }
}
