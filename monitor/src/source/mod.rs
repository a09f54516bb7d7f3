pub mod http;
pub mod replay;

use image::imageops::{self, FilterType};
use motion_monitor_common::frame::{Frame, FrameError};
use tracing::debug;

/// A camera-like producer of RGB frames.
///
/// `start` acquires the device and may block through a warm-up delay.
/// `capture` pulls exactly one frame. `stop` releases the device and must be
/// safe to call more than once.
#[allow(async_fn_in_trait)]
pub trait FrameSource {
    async fn start(&mut self) -> Result<(), SourceError>;

    async fn capture(&mut self) -> Result<Frame, SourceError>;

    async fn stop(&mut self);

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("frame source used before start()")]
    NotStarted,
    #[error("failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),
    #[error("HTTP request failed: {0}")]
    HttpFetch(reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("failed to read {0}: {1}")]
    Io(String, std::io::Error),
    #[error("no images found in {0}")]
    EmptyDirectory(String),
    #[error("replay of {0} exhausted")]
    Exhausted(String),
}

/// Resize `frame` to the configured resolution if the device delivered
/// something else, so the detector always sees one fixed size.
pub fn conform(frame: Frame, width: u32, height: u32) -> Frame {
    if frame.dimensions() == (width, height) {
        return frame;
    }
    debug!(
        got = ?frame.dimensions(),
        want = ?(width, height),
        seq = frame.seq,
        "resizing frame to configured resolution"
    );
    let pixels = imageops::resize(&frame.pixels, width, height, FilterType::Triangle);
    Frame::new(pixels, frame.captured_at_ms, frame.seq)
}
