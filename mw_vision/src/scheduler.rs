//! ABOUTME: Frame-skip gate and one-time region-of-interest resolution
//! ABOUTME: Numbers frames from 1 and freezes the effective ROI on the first frame

use crate::{MotionConfig, Rect};
use tracing::{info, warn};

/// Whether the 1-based `frame_index` is analysed with `skip` frames between analyses
pub fn should_process(frame_index: u64, skip: u32) -> bool {
    skip == 0 || frame_index % (skip as u64 + 1) == 0
}

/// Clamp the configured ROI to the frame, falling back to the full frame
pub fn resolve_roi(configured: Option<Rect>, width: u32, height: u32) -> Rect {
    let full = Rect::full_frame(width, height);
    let Some(roi) = configured else {
        return full;
    };

    if roi.is_empty() {
        warn!(roi = %roi, "Configured ROI is empty, using full frame");
        return full;
    }

    let effective = roi.intersect(&full);
    if effective.is_empty() {
        warn!(
            roi = %roi,
            width,
            height,
            "Configured ROI lies outside the frame, using full frame"
        );
        return full;
    }
    effective
}

/// What to do with the frame just read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    Process,
    Skip,
}

/// Frame counter plus the frozen effective ROI
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    skip: u32,
    frame_index: u64,
    roi: Rect,
}

impl FrameScheduler {
    /// Resolve the ROI against the first frame's processed dimensions
    pub fn initialize(config: &MotionConfig, width: u32, height: u32) -> Self {
        let roi = resolve_roi(config.roi, width, height);
        info!(
            roi = %roi,
            frame_skip = config.frame_skip,
            "Frame scheduler initialized"
        );
        Self {
            skip: config.frame_skip,
            frame_index: 0,
            roi,
        }
    }

    /// Advance to the next frame and classify it
    pub fn next_frame(&mut self) -> (u64, FrameDisposition) {
        self.frame_index += 1;
        let disposition = if should_process(self.frame_index, self.skip) {
            FrameDisposition::Process
        } else {
            FrameDisposition::Skip
        };
        (self.frame_index, disposition)
    }

    pub fn roi(&self) -> Rect {
        self.roi
    }

    /// Frames seen so far
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}
