//! ABOUTME: Binarization and morphological cleanup of foreground likelihood masks
//! ABOUTME: Thresholds, erodes, dilates, then keeps only the region of interest

use crate::{MotionConfig, Rect};
use image::{imageops, GrayImage, Luma};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use mw_core::Result;

const FOREGROUND: u8 = 255;

/// Foreground mask with the dimensions of the processed frame
///
/// Stored as a 0/255 grayscale image so it can go straight to the
/// morphology and contour routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    image: GrayImage,
}

impl BinaryMask {
    /// All-false mask
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::new(width, height),
        }
    }

    /// Mask that is true wherever `likelihood > threshold`
    pub fn from_threshold(likelihood: &GrayImage, level: u8) -> Self {
        Self {
            image: threshold(likelihood, level, ThresholdType::Binary),
        }
    }

    /// Wrap an image, treating every non-zero pixel as foreground
    pub fn from_image(mut image: GrayImage) -> Self {
        for pixel in image.pixels_mut() {
            if pixel.0[0] != 0 {
                pixel.0[0] = FOREGROUND;
            }
        }
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Value at `(x, y)`; out-of-range coordinates read as false
    pub fn get(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 {
            return false;
        }
        self.image
            .get_pixel_checked(x as u32, y as u32)
            .map(|p| p.0[0] != 0)
            .unwrap_or(false)
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if let Some(pixel) = self.image.get_pixel_mut_checked(x, y) {
            *pixel = Luma([if value { FOREGROUND } else { 0 }]);
        }
    }

    /// Number of foreground pixels
    pub fn count(&self) -> usize {
        self.image.as_raw().iter().filter(|&&v| v != 0).count()
    }

    pub fn is_clear(&self) -> bool {
        self.image.as_raw().iter().all(|&v| v == 0)
    }

    /// Borrow the 0/255 image
    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    /// 0/255 grayscale rendering
    pub fn to_image(&self) -> GrayImage {
        self.image.clone()
    }

    /// One pass of a 3x3 square erosion; neighbours outside the frame are ignored
    pub fn erode(&self) -> Self {
        Self {
            image: morphology::erode(&self.image, Norm::LInf, 1),
        }
    }

    /// One pass of a 3x3 square dilation
    pub fn dilate(&self) -> Self {
        Self {
            image: morphology::dilate(&self.image, Norm::LInf, 1),
        }
    }

    /// Copy of this mask with everything outside `roi` cleared
    pub fn restricted_to(&self, roi: &Rect) -> Self {
        let area = roi.intersect(&Rect::full_frame(self.width(), self.height()));
        let mut out = Self::new(self.width(), self.height());
        if area.is_empty() {
            return out;
        }

        let kept = imageops::crop_imm(
            &self.image,
            area.x as u32,
            area.y as u32,
            area.width as u32,
            area.height as u32,
        )
        .to_image();
        imageops::replace(&mut out.image, &kept, area.x as i64, area.y as i64);
        out
    }
}

/// Converts likelihood masks into cleaned binary masks
#[derive(Debug, Clone)]
pub struct MaskProcessor {
    threshold: u8,
    erode_iterations: u32,
    dilate_iterations: u32,
    #[cfg_attr(not(feature = "heavy_opencv"), allow(dead_code))]
    use_opencv: bool,
}

impl MaskProcessor {
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            threshold: config.threshold,
            erode_iterations: config.erode_iterations,
            dilate_iterations: config.dilate_iterations,
            use_opencv: config.backend.use_opencv,
        }
    }

    /// Threshold, erode, dilate, then restrict to `roi`
    pub fn process(&self, likelihood: &GrayImage, roi: &Rect) -> Result<BinaryMask> {
        #[cfg(feature = "heavy_opencv")]
        if self.use_opencv {
            let cleaned = crate::cv_ops::clean_mask(
                likelihood,
                self.threshold,
                self.erode_iterations,
                self.dilate_iterations,
            )?;
            return Ok(BinaryMask::from_image(cleaned).restricted_to(roi));
        }

        let mut mask = BinaryMask::from_threshold(likelihood, self.threshold);
        for _ in 0..self.erode_iterations {
            mask = mask.erode();
        }
        for _ in 0..self.dilate_iterations {
            mask = mask.dilate();
        }

        Ok(mask.restricted_to(roi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::create_test_frame_with_motion;

    fn mask_with_block(w: u32, h: u32, x: u32, y: u32, bw: u32, bh: u32) -> BinaryMask {
        BinaryMask::from_threshold(&create_test_frame_with_motion(w, h, x, y, bw, bh, 255), 100)
    }

    #[test]
    fn test_threshold_is_strictly_greater() {
        let mut likelihood = GrayImage::new(3, 1);
        likelihood.put_pixel(0, 0, Luma([25]));
        likelihood.put_pixel(1, 0, Luma([26]));
        likelihood.put_pixel(2, 0, Luma([127]));
        let mask = BinaryMask::from_threshold(&likelihood, 25);
        assert!(!mask.get(0, 0));
        assert!(mask.get(1, 0));
        assert!(mask.get(2, 0));
    }

    #[test]
    fn test_shadow_value_is_dropped_by_high_threshold() {
        let likelihood = GrayImage::from_pixel(4, 4, Luma([127]));
        assert_eq!(BinaryMask::from_threshold(&likelihood, 127).count(), 0);
        assert_eq!(BinaryMask::from_threshold(&likelihood, 126).count(), 16);
    }

    #[test]
    fn test_dilate_grows_block_by_one() {
        let mask = mask_with_block(20, 20, 5, 5, 4, 4);
        assert_eq!(mask.count(), 16);
        let dilated = mask.dilate();
        assert_eq!(dilated.count(), 36);
        assert!(dilated.get(4, 4));
        assert!(!dilated.get(3, 3));
    }

    #[test]
    fn test_erode_shrinks_block_by_one() {
        let mask = mask_with_block(20, 20, 5, 5, 4, 4);
        let eroded = mask.erode();
        assert_eq!(eroded.count(), 4);
        assert!(eroded.get(6, 6));
        assert!(!eroded.get(5, 5));
    }

    #[test]
    fn test_erode_removes_isolated_pixels() {
        let mut mask = BinaryMask::new(10, 10);
        mask.set(3, 3, true);
        mask.set(7, 2, true);
        assert!(mask.erode().is_clear());
    }

    #[test]
    fn test_erode_ignores_out_of_frame_neighbours() {
        let full = mask_with_block(6, 6, 0, 0, 6, 6);
        assert_eq!(full.erode().count(), 36);
    }

    #[test]
    fn test_roi_clears_outside() {
        let mask = mask_with_block(20, 20, 0, 0, 20, 20);
        let restricted = mask.restricted_to(&Rect::new(5, 5, 4, 3));
        assert_eq!(restricted.count(), 12);
        assert!(restricted.get(5, 5));
        assert!(!restricted.get(4, 5));
        assert!(!restricted.get(9, 5));
    }

    #[test]
    fn test_processor_pipeline() {
        let config = MotionConfig {
            threshold: 25,
            erode_iterations: 1,
            dilate_iterations: 2,
            ..Default::default()
        };
        let processor = MaskProcessor::new(&config);

        // A lone noise pixel disappears, the block survives and grows
        let mut likelihood = create_test_frame_with_motion(40, 40, 10, 10, 6, 6, 255);
        for p in likelihood.pixels_mut() {
            if p.0[0] == 64 {
                p.0[0] = 0;
            }
        }
        likelihood.put_pixel(30, 30, Luma([255]));

        let mask = processor
            .process(&likelihood, &Rect::full_frame(40, 40))
            .unwrap();
        assert!(!mask.get(30, 30));
        // 6x6 -> eroded 4x4 -> dilated twice 8x8
        assert_eq!(mask.count(), 64);

        let clipped = processor
            .process(&likelihood, &Rect::new(0, 0, 12, 40))
            .unwrap();
        assert!(clipped.count() < 64);
        assert!(!clipped.get(12, 12));
    }

    #[test]
    fn test_roi_outside_frame_clears_everything() {
        let mask = mask_with_block(10, 10, 0, 0, 10, 10);
        assert!(mask.restricted_to(&Rect::new(20, 20, 5, 5)).is_clear());
    }

    #[test]
    fn test_from_image_normalizes_foreground() {
        let mut image = GrayImage::new(3, 1);
        image.put_pixel(1, 0, Luma([127]));
        let mask = BinaryMask::from_image(image);
        assert_eq!(mask.count(), 1);
        assert_eq!(mask.as_image().get_pixel(1, 0).0[0], 255);
    }

    #[test]
    fn test_to_image() {
        let mask = mask_with_block(4, 4, 1, 1, 2, 2);
        let image = mask.to_image();
        assert_eq!(image.get_pixel(1, 1).0[0], 255);
        assert_eq!(image.get_pixel(0, 0).0[0], 0);
    }
}
