//! ABOUTME: Captured video frame with its capture timestamp
//! ABOUTME: Owned by a single pipeline iteration and never mutated by stages

use image::RgbImage;
use std::time::SystemTime;

/// A decoded RGB frame plus the wall-clock time it was captured
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    captured_at: SystemTime,
}

impl Frame {
    pub fn new(image: RgbImage, captured_at: SystemTime) -> Self {
        Self { image, captured_at }
    }

    /// Frame stamped with the current time
    pub fn now(image: RgbImage) -> Self {
        Self::new(image, SystemTime::now())
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
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

    /// Empty frames mark the end of a stream
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}
