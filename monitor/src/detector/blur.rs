use image::{GrayImage, Luma};

// Fixed binomial kernels used for small apertures when sigma is derived
// from the kernel size.
const KERNEL_1: [f32; 1] = [1.0];
const KERNEL_3: [f32; 3] = [0.25, 0.5, 0.25];
const KERNEL_5: [f32; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];
const KERNEL_7: [f32; 7] = [
    0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125,
];

/// Sigma derived from an odd kernel size.
pub fn auto_sigma(ksize: u32) -> f64 {
    0.3 * ((ksize as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1-D Gaussian weights for an odd `ksize`.
pub fn gaussian_kernel(ksize: u32) -> Vec<f32> {
    match ksize {
        1 => return KERNEL_1.to_vec(),
        3 => return KERNEL_3.to_vec(),
        5 => return KERNEL_5.to_vec(),
        7 => return KERNEL_7.to_vec(),
        _ => {}
    }

    let sigma = auto_sigma(ksize);
    let scale = -0.5 / (sigma * sigma);
    let center = (ksize as f64 - 1.0) * 0.5;
    let raw: Vec<f64> = (0..ksize)
        .map(|i| {
            let x = i as f64 - center;
            (scale * x * x).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|w| (w / sum) as f32).collect()
}

/// Map an out-of-range coordinate back into `0..len`, reflecting about the
/// edge pixel without repeating it (`gfedcb|abcdefgh|gfedcba`).
pub fn reflect_101(mut i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    loop {
        if i < 0 {
            i = -i;
        } else if i > last {
            i = 2 * last - i;
        } else {
            return i as usize;
        }
    }
}

/// Padded-position -> source-index table for one axis.
fn border_table(len: usize, radius: usize) -> Vec<usize> {
    (0..len + 2 * radius)
        .map(|p| reflect_101(p as isize - radius as isize, len))
        .collect()
}

/// Separable Gaussian blur with a square `ksize x ksize` aperture.
///
/// `ksize` must be odd; the caller validates it.
pub fn gaussian_blur(src: &GrayImage, ksize: u32) -> GrayImage {
    let (width, height) = src.dimensions();
    let (w, h) = (width as usize, height as usize);
    if ksize <= 1 || w == 0 || h == 0 {
        return src.clone();
    }

    let kernel = gaussian_kernel(ksize);
    let radius = kernel.len() / 2;
    let cols = border_table(w, radius);
    let rows = border_table(h, radius);
    let raw = src.as_raw();

    // Horizontal pass into a float buffer.
    let mut horizontal = vec![0f32; w * h];
    for y in 0..h {
        let row = &raw[y * w..(y + 1) * w];
        let out = &mut horizontal[y * w..(y + 1) * w];
        for (x, dst) in out.iter_mut().enumerate() {
            *dst = kernel
                .iter()
                .zip(&cols[x..x + kernel.len()])
                .map(|(k, &sx)| k * row[sx] as f32)
                .sum();
        }
    }

    // Vertical pass, rounded back to 8 bits.
    let mut out = GrayImage::new(width, height);
    for y in 0..h {
        let taps = &rows[y..y + kernel.len()];
        for x in 0..w {
            let v: f32 = kernel
                .iter()
                .zip(taps)
                .map(|(k, &sy)| k * horizontal[sy * w + x])
                .sum();
            out.put_pixel(x as u32, y as u32, Luma([v.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernels_are_normalized_and_symmetric() {
        for k in [1u32, 3, 5, 7, 9, 21, 31] {
            let kernel = gaussian_kernel(k);
            assert_eq!(kernel.len(), k as usize);
            let sum: f32 = kernel.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "k={k} sum={sum}");
            for i in 0..kernel.len() {
                assert!((kernel[i] - kernel[kernel.len() - 1 - i]).abs() < 1e-7);
            }
        }
    }

    #[test]
    fn kernel_peaks_at_center() {
        let kernel = gaussian_kernel(21);
        let max = kernel.iter().cloned().fold(f32::MIN, f32::max);
        assert_eq!(kernel[10], max);
    }

    #[test]
    fn sigma_for_default_aperture() {
        assert!((auto_sigma(21) - 3.5).abs() < 1e-12);
    }

    #[test]
    fn reflect_does_not_repeat_edge() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(2, 5), 2);
    }

    #[test]
    fn reflect_folds_when_radius_exceeds_length() {
        // 4 pixels, radius 10: every index must land in range.
        for i in -10..14 {
            assert!(reflect_101(i, 4) < 4);
        }
        assert_eq!(reflect_101(-7, 1), 0);
    }

    #[test]
    fn uniform_image_is_unchanged() {
        let img = GrayImage::from_pixel(16, 12, Luma([255]));
        let out = gaussian_blur(&img, 21);
        assert!(out.pixels().all(|p| p.0[0] == 255));

        let img = GrayImage::from_pixel(4, 4, Luma([0]));
        let out = gaussian_blur(&img, 21);
        assert!(out.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn impulse_spreads_symmetrically() {
        let mut img = GrayImage::new(11, 11);
        img.put_pixel(5, 5, Luma([255]));
        let out = gaussian_blur(&img, 5);
        let center = out.get_pixel(5, 5).0[0];
        assert!(center < 255 && center > 0);
        assert_eq!(out.get_pixel(4, 5), out.get_pixel(6, 5));
        assert_eq!(out.get_pixel(5, 4), out.get_pixel(5, 6));
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn unit_kernel_is_identity() {
        let mut img = GrayImage::new(3, 3);
        img.put_pixel(1, 2, Luma([77]));
        assert_eq!(gaussian_blur(&img, 1), img);
    }
}
