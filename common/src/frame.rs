use image::{ImageReader, RgbImage};
use std::io::Cursor;

/// A captured camera frame with timestamp metadata.
///
/// Pixels are always 8-bit RGB, row-major, in the order the camera produced
/// them. A frame is never mutated after capture; consumers borrow it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub pixels: RgbImage,
    pub captured_at_ms: i64,
    pub seq: u64,
}

impl Frame {
    pub fn new(pixels: RgbImage, captured_at_ms: i64, seq: u64) -> Self {
        Self {
            pixels,
            captured_at_ms,
            seq,
        }
    }

    /// Decode an encoded still image (JPEG, PNG) into an RGB frame.
    pub fn decode(encoded: &[u8], captured_at_ms: i64, seq: u64) -> Result<Self, FrameError> {
        if encoded.is_empty() {
            return Err(FrameError::Empty);
        }
        let img = ImageReader::new(Cursor::new(encoded))
            .with_guessed_format()
            .map_err(|e| FrameError::Decode(e.to_string()))?
            .decode()
            .map_err(|e| FrameError::Decode(e.to_string()))?;
        Ok(Self::new(img.to_rgb8(), captured_at_ms, seq))
    }

    /// Solid-color frame, mostly useful for tests and calibration.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], captured_at_ms: i64, seq: u64) -> Self {
        Self::new(
            RgbImage::from_pixel(width, height, image::Rgb(rgb)),
            captured_at_ms,
            seq,
        )
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("encoded frame is empty")]
    Empty,
    #[error("failed to decode frame: {0}")]
    Decode(String),
}
