pub mod blur;
pub mod luma;

use image::GrayImage;
use motion_monitor_common::frame::Frame;
use tracing::{debug, warn};

/// Grayscale, blurred version of a frame used for comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedFrame(GrayImage);

impl ReducedFrame {
    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("blur kernel must be odd and positive, got {0}")]
    InvalidKernel(u32),
    #[error("frame is {got:?} but the baseline is {expected:?}; detector re-baselined")]
    DimensionMismatch {
        expected: (u32, u32),
        got: (u32, u32),
    },
    #[error("frame has no pixels")]
    EmptyFrame,
}

/// Frame-differencing motion detector.
///
/// Each frame is reduced to blurred luma and compared with the previous
/// reduced frame. The score is the percentage of pixels whose intensity
/// moved by more than `pixel_diff_threshold`. The first frame only sets the
/// baseline and always scores 0.
#[derive(Debug)]
pub struct MotionDetector {
    pixel_diff_threshold: u8,
    blur_kernel: u32,
    previous: Option<ReducedFrame>,
}

impl MotionDetector {
    pub fn new(pixel_diff_threshold: u8, blur_kernel: u32) -> Result<Self, DetectorError> {
        if blur_kernel == 0 || blur_kernel % 2 == 0 {
            return Err(DetectorError::InvalidKernel(blur_kernel));
        }
        Ok(Self {
            pixel_diff_threshold,
            blur_kernel,
            previous: None,
        })
    }

    /// Reduce a frame to the representation the detector compares.
    pub fn reduce(&self, frame: &Frame) -> ReducedFrame {
        let gray = luma::to_luma(&frame.pixels);
        ReducedFrame(blur::gaussian_blur(&gray, self.blur_kernel))
    }

    /// Score `frame` against the previous sample and advance the baseline.
    pub fn score(&mut self, frame: &Frame) -> Result<f64, DetectorError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectorError::EmptyFrame);
        }

        let current = self.reduce(frame);
        let result = match &self.previous {
            None => {
                debug!(seq = frame.seq, width, height, "first frame, baseline set");
                Ok(0.0)
            }
            Some(previous) if previous.dimensions() != current.dimensions() => {
                warn!(
                    expected = ?previous.dimensions(),
                    got = ?current.dimensions(),
                    "frame size changed, baseline reset"
                );
                Err(DetectorError::DimensionMismatch {
                    expected: previous.dimensions(),
                    got: current.dimensions(),
                })
            }
            Some(previous) => {
                let changed =
                    changed_pixels(previous.as_gray(), current.as_gray(), self.pixel_diff_threshold);
                let total = width as u64 * height as u64;
                let score = changed as f64 / total as f64 * 100.0;
                debug!(
                    seq = frame.seq,
                    changed,
                    total,
                    score = format!("{score:.2}"),
                    "frame difference"
                );
                Ok(score)
            }
        };

        // The baseline advances on every frame, including a size change.
        self.previous = Some(current);
        result
    }

    /// Drop the baseline so the next frame scores 0.
    #[allow(dead_code)]
    pub fn reset(&mut self) {
        self.previous = None;
    }

    #[allow(dead_code)]
    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }
}

/// Count pixels whose absolute difference is strictly above `threshold`.
fn changed_pixels(a: &GrayImage, b: &GrayImage, threshold: u8) -> u64 {
    a.as_raw()
        .iter()
        .zip(b.as_raw())
        .filter(|(p, q)| p.abs_diff(**q) > threshold)
        .count() as u64
}
