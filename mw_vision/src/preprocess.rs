//! ABOUTME: Frame normalization ahead of background modelling
//! ABOUTME: Downscales, converts to BT.601 luma, and applies a separable Gaussian blur

use crate::{Frame, MotionConfig};
use image::{imageops, GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::filter::separable_filter_equal;
use tracing::debug;

/// Round an even kernel size up to the next odd value
///
/// # Examples
///
/// ```
/// use mw_vision::preprocess::normalize_kernel_size;
/// assert_eq!(normalize_kernel_size(20), 21);
/// assert_eq!(normalize_kernel_size(21), 21);
/// ```
pub fn normalize_kernel_size(size: u32) -> u32 {
    if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}

/// Normalized 1-D Gaussian weights for an odd kernel size
///
/// Sigma follows the usual derivation from the aperture:
/// `0.3 * ((size - 1) * 0.5 - 1) + 0.8`.
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    let size = normalize_kernel_size(size.max(1));
    if size == 1 {
        return vec![1.0];
    }

    let sigma = 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (size / 2) as i64;
    let scale = -0.5 / (sigma * sigma);

    let raw: Vec<f64> = (-half..=half)
        .map(|offset| (scale * (offset * offset) as f64).exp())
        .collect();
    let sum: f64 = raw.iter().sum();

    raw.into_iter().map(|w| (w / sum) as f32).collect()
}

/// Stateless frame preprocessor
#[derive(Debug, Clone)]
pub struct Preprocessor {
    scale: f64,
    kernel: Vec<f32>,
}

impl Preprocessor {
    pub fn new(config: &MotionConfig) -> Self {
        let kernel_size = normalize_kernel_size(config.blur_kernel);
        debug!(
            scale = config.resize_factor,
            kernel_size, "Creating frame preprocessor"
        );

        Self {
            scale: config.resize_factor,
            kernel: gaussian_kernel(kernel_size),
        }
    }

    /// Effective blur kernel size
    pub fn kernel_size(&self) -> u32 {
        self.kernel.len() as u32
    }

    /// Dimensions a `width` x `height` frame has after [`Preprocessor::resize`]
    pub fn scaled_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if self.scale >= 1.0 {
            return (width, height);
        }
        let scale_dim = |dim: u32| ((dim as f64 * self.scale).round() as u32).max(1);
        (scale_dim(width), scale_dim(height))
    }

    /// Downscale a frame by the configured factor; identity when the factor is 1
    pub fn resize(&self, frame: Frame) -> Frame {
        let (width, height) = frame.dimensions();
        let (target_width, target_height) = self.scaled_dimensions(width, height);

        if (target_width, target_height) == (width, height) {
            return frame;
        }

        let captured_at = frame.captured_at();
        let resized = imageops::resize(
            frame.image(),
            target_width,
            target_height,
            imageops::FilterType::Triangle,
        );
        Frame::new(resized, captured_at)
    }

    /// Grayscale + blur representation consumed by the background model
    pub fn prepare(&self, frame: &Frame) -> GrayImage {
        let gray = to_luma(frame.image());
        separable_blur(&gray, &self.kernel)
    }
}

/// BT.601 luma conversion with integer rounding
pub fn to_luma(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        Luma([((299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000) as u8])
    })
}

/// Convolve rows then columns with the same 1-D kernel
///
/// Filtering runs in `f32` so the intermediate pass is not truncated; edge
/// samples are replicated past the border.
pub fn separable_blur(image: &GrayImage, kernel: &[f32]) -> GrayImage {
    if kernel.len() <= 1 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    let samples: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
            Luma([image.get_pixel(x, y).0[0] as f32])
        });
    let blurred = separable_filter_equal(&samples, kernel);

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([blurred.get_pixel(x, y).0[0].round().clamp(0.0, 255.0) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{create_rgb_frame, create_test_frame_with_motion};
    use image::Rgb;

    #[test]
    fn test_normalize_kernel_size_is_odd_and_not_smaller() {
        for size in 0..64 {
            let normalized = normalize_kernel_size(size);
            assert_eq!(normalized % 2, 1, "size {} gave {}", size, normalized);
            assert!(normalized >= size);
            assert!(normalized - size <= 1);
        }
    }

    #[test]
    fn test_gaussian_kernel_is_normalized_and_symmetric() {
        for size in [1, 3, 5, 21] {
            let kernel = gaussian_kernel(size);
            assert_eq!(kernel.len(), size as usize);
            let sum: f32 = kernel.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4);
            for i in 0..kernel.len() / 2 {
                assert!((kernel[i] - kernel[kernel.len() - 1 - i]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_gaussian_kernel_even_size_is_bumped() {
        assert_eq!(gaussian_kernel(4).len(), 5);
    }

    #[test]
    fn test_luma_of_gray_is_identity() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([64, 64, 64]));
        image.put_pixel(1, 0, Rgb([200, 200, 200]));
        let gray = to_luma(&image);
        assert_eq!(gray.get_pixel(0, 0).0[0], 64);
        assert_eq!(gray.get_pixel(1, 0).0[0], 200);
    }

    #[test]
    fn test_luma_weights() {
        let mut image = RgbImage::new(3, 1);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        image.put_pixel(1, 0, Rgb([0, 255, 0]));
        image.put_pixel(2, 0, Rgb([0, 0, 255]));
        let gray = to_luma(&image);
        assert_eq!(gray.get_pixel(0, 0).0[0], 76);
        assert_eq!(gray.get_pixel(1, 0).0[0], 150);
        assert_eq!(gray.get_pixel(2, 0).0[0], 29);
    }

    #[test]
    fn test_blur_preserves_uniform_image() {
        let image = GrayImage::from_pixel(30, 20, Luma([64]));
        let blurred = separable_blur(&image, &gaussian_kernel(21));
        assert!(blurred.pixels().all(|p| p.0[0] == 64));
    }

    #[test]
    fn test_blur_spreads_a_block() {
        let image = create_test_frame_with_motion(60, 60, 20, 20, 20, 20, 200);
        let blurred = separable_blur(&image, &gaussian_kernel(9));
        // Edge pixels soften, centre stays close to the block intensity
        assert!(blurred.get_pixel(30, 30).0[0] > 190);
        let just_outside = blurred.get_pixel(18, 30).0[0];
        assert!(just_outside > 64 && just_outside < 200);
        assert_eq!(blurred.get_pixel(2, 2).0[0], 64);
    }

    #[test]
    fn test_blur_at_frame_edge_keeps_border_level() {
        let image = create_test_frame_with_motion(30, 30, 0, 0, 30, 3, 200);
        let blurred = separable_blur(&image, &gaussian_kernel(5));
        assert_eq!(blurred.get_pixel(15, 0).0[0], 200);
        assert_eq!(blurred.get_pixel(15, 29).0[0], 64);
    }

    #[test]
    fn test_resize_identity_when_scale_is_one() {
        let preprocessor = Preprocessor::new(&MotionConfig::default());
        let frame = create_rgb_frame(64, 48, 10);
        let resized = preprocessor.resize(frame);
        assert_eq!(resized.dimensions(), (64, 48));
    }

    #[test]
    fn test_resize_scales_dimensions() {
        let config = MotionConfig {
            resize_factor: 0.5,
            ..Default::default()
        };
        let preprocessor = Preprocessor::new(&config);
        assert_eq!(preprocessor.scaled_dimensions(101, 50), (51, 25));

        let frame = create_rgb_frame(100, 50, 10);
        let captured_at = frame.captured_at();
        let resized = preprocessor.resize(frame);
        assert_eq!(resized.dimensions(), (50, 25));
        assert_eq!(resized.captured_at(), captured_at);
    }

    #[test]
    fn test_prepare_outputs_single_channel_same_size() {
        let preprocessor = Preprocessor::new(&MotionConfig::default());
        assert_eq!(preprocessor.kernel_size(), 21);
        let gray = preprocessor.prepare(&create_rgb_frame(40, 30, 0));
        assert_eq!(gray.dimensions(), (40, 30));
        assert!(gray.pixels().all(|p| p.0[0] == 64));
    }
}
