//! ABOUTME: Per-frame motion detection with adaptive background subtraction
//! ABOUTME: Preprocess, model, mask cleanup, region extraction, decision and snapshot throttling

use mw_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

pub mod annotate;
pub mod background;
#[cfg(feature = "heavy_opencv")]
mod cv_ops;
pub mod decision;
pub mod frame;
pub mod geometry;
pub mod mask;
pub mod monitor;
pub mod pipeline;
pub mod preprocess;
pub mod regions;
pub mod scheduler;
pub mod throttle;

pub use background::{create_background_model, BackgroundModel};
pub use decision::MotionVerdict;
pub use frame::Frame;
pub use geometry::Rect;
pub use mask::{BinaryMask, MaskProcessor};
pub use monitor::{
    EventLogger, FrameSource, Monitor, RenderView, Renderer, RunSummary, SnapshotSink, StopReason,
};
pub use pipeline::{FrameOutcome, MotionPipeline, ProcessedFrame, SkippedFrame};
pub use preprocess::Preprocessor;
pub use regions::{Region, RegionExtractor};
pub use scheduler::{FrameDisposition, FrameScheduler};
pub use throttle::SnapshotThrottle;

// Re-export image types for benchmarks and downstream crates
pub use image;

/// Motion detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MotionConfig {
    /// Downscale factor applied before processing (1.0 = full size)
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub resize_factor: f64,
    /// Frames skipped between processed frames
    pub frame_skip: u32,
    /// Gaussian blur aperture; even values are bumped to the next odd one
    #[validate(range(min = 1, max = 255))]
    pub blur_kernel: u32,
    /// Likelihood above which a pixel counts as foreground
    pub threshold: u8,
    pub erode_iterations: u32,
    pub dilate_iterations: u32,
    /// Minimum contour area of a motion region, in processed pixels
    #[validate(range(min = 0.0))]
    pub min_area: f64,
    pub algorithm: BackgroundAlgorithm,
    /// Region of interest in processed-frame coordinates
    pub roi: Option<Rect>,
    #[validate(nested)]
    pub backend: BackgroundTuning,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            resize_factor: 1.0,
            frame_skip: 0,
            blur_kernel: 21,
            threshold: 25,
            erode_iterations: 0,
            dilate_iterations: 2,
            min_area: 500.0,
            algorithm: BackgroundAlgorithm::Mog2,
            roi: None,
            backend: BackgroundTuning::default(),
        }
    }
}

impl MotionConfig {
    /// Run derive validation plus the checks attributes cannot express
    pub fn check(&self) -> Result<()> {
        self.validate()?;

        if let Some(roi) = &self.roi {
            if roi.width <= 0 || roi.height <= 0 {
                return Err(Error::Config(format!(
                    "ROI width and height must be positive, got {}",
                    roi
                )));
            }
        }
        Ok(())
    }

    /// Blur aperture actually used by the preprocessor
    pub fn effective_blur_kernel(&self) -> u32 {
        preprocess::normalize_kernel_size(self.blur_kernel)
    }
}

/// Available background subtraction algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundAlgorithm {
    /// Adaptive Gaussian mixture
    #[default]
    Mog2,
    /// Non-parametric sample set
    Knn,
}

impl fmt::Display for BackgroundAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mog2 => write!(f, "mog2"),
            Self::Knn => write!(f, "knn"),
        }
    }
}

impl FromStr for BackgroundAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mog2" => Ok(Self::Mog2),
            "knn" => Ok(Self::Knn),
            other => Err(Error::Config(format!(
                "Unsupported background subtractor: {}",
                other
            ))),
        }
    }
}

/// Estimator tuning shared by the native and OpenCV backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BackgroundTuning {
    /// Frames of history the model adapts over
    #[validate(range(min = 1))]
    pub history: u32,
    /// MOG2 squared Mahalanobis distance threshold
    #[validate(range(min = 0.0))]
    pub var_threshold: f64,
    /// KNN squared distance threshold
    #[validate(range(min = 0.0))]
    pub dist2_threshold: f64,
    pub detect_shadows: bool,
    /// Delegate to OpenCV subtractors (requires heavy_opencv)
    pub use_opencv: bool,
}

impl Default for BackgroundTuning {
    fn default() -> Self {
        Self {
            history: 500,
            var_threshold: 16.0,
            dist2_threshold: 400.0,
            detect_shadows: true,
            use_opencv: false,
        }
    }
}

/// Utility functions for synthetic frames
pub mod utils {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    /// Background intensity used by every synthetic frame
    pub const BACKGROUND_LEVEL: u8 = 64;

    /// Create a synthetic grayscale frame with motion in the specified region
    pub fn create_test_frame_with_motion(
        width: u32,
        height: u32,
        motion_x: u32,
        motion_y: u32,
        motion_width: u32,
        motion_height: u32,
        intensity: u8,
    ) -> GrayImage {
        let mut img = ImageBuffer::from_pixel(width, height, Luma([BACKGROUND_LEVEL]));

        for y in motion_y..(motion_y + motion_height).min(height) {
            for x in motion_x..(motion_x + motion_width).min(width) {
                img.put_pixel(x, y, Luma([intensity]));
            }
        }

        img
    }

    /// Timestamp `millis` milliseconds after the epoch
    pub fn timestamp_millis(millis: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(millis)
    }

    /// Uniform gray RGB frame captured at `at_millis`
    pub fn create_rgb_frame(width: u32, height: u32, at_millis: u64) -> Frame {
        let image = RgbImage::from_pixel(width, height, Rgb([BACKGROUND_LEVEL; 3]));
        Frame::new(image, timestamp_millis(at_millis))
    }

    /// RGB frame with a solid block of `intensity` over the gray background
    pub fn create_rgb_frame_with_block(
        width: u32,
        height: u32,
        block: Rect,
        intensity: u8,
        at_millis: u64,
    ) -> Frame {
        let mut image = RgbImage::from_pixel(width, height, Rgb([BACKGROUND_LEVEL; 3]));
        let visible = block.intersect(&Rect::full_frame(width, height));

        for y in visible.y..visible.bottom() {
            for x in visible.x..visible.right() {
                image.put_pixel(x as u32, y as u32, Rgb([intensity; 3]));
            }
        }

        Frame::new(image, timestamp_millis(at_millis))
    }
}
