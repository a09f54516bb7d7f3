use image::{GrayImage, Luma, RgbImage};

// BT.601 weights in Q14 fixed point: 0.299, 0.587, 0.114.
const R_WEIGHT: u32 = 4899;
const G_WEIGHT: u32 = 9617;
const B_WEIGHT: u32 = 1868;
const SHIFT: u32 = 14;
const ROUND: u32 = 1 << (SHIFT - 1);

/// Convert an RGB frame to single-channel intensity.
///
/// Uses the BT.601 luma weighting that camera pipelines expect, not the
/// Rec. 709 weights `image::DynamicImage::to_luma8` applies.
pub fn to_luma(rgb: &RgbImage) -> GrayImage {
    let (width, height) = rgb.dimensions();
    let mut gray = GrayImage::new(width, height);
    for (src, dst) in rgb.pixels().zip(gray.pixels_mut()) {
        let [r, g, b] = src.0;
        *dst = Luma([luma(r, g, b)]);
    }
    gray
}

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = (r as u32 * R_WEIGHT + g as u32 * G_WEIGHT + b as u32 * B_WEIGHT + ROUND) >> SHIFT;
    y.min(255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn grays_map_to_themselves() {
        for v in [0u8, 1, 25, 100, 128, 254, 255] {
            assert_eq!(luma(v, v, v), v, "gray level {v}");
        }
    }

    #[test]
    fn primaries_use_bt601_weights() {
        assert_eq!(luma(255, 0, 0), 76);
        assert_eq!(luma(0, 255, 0), 150);
        assert_eq!(luma(0, 0, 255), 29);
    }

    #[test]
    fn preserves_dimensions() {
        let mut rgb = RgbImage::new(5, 3);
        rgb.put_pixel(4, 2, Rgb([255, 255, 255]));
        let gray = to_luma(&rgb);
        assert_eq!(gray.dimensions(), (5, 3));
        assert_eq!(gray.get_pixel(4, 2).0[0], 255);
        assert_eq!(gray.get_pixel(0, 0).0[0], 0);
    }
}
