//! ABOUTME: OpenCV-backed MOG2/KNN background subtraction
//! ABOUTME: Same interface as the native models, delegating statistics to OpenCV

use super::{check_dimensions, BackgroundModel};
use crate::cv_ops::{cv_error, gray_to_mat, mat_to_gray};
use crate::{BackgroundAlgorithm, MotionConfig};
use image::GrayImage;
use mw_core::Result;
use opencv::{
    core::{Mat, Ptr},
    prelude::*,
    video::{self, BackgroundSubtractorKNN, BackgroundSubtractorMOG2},
};
use tracing::debug;

enum Subtractor {
    Mog2(Ptr<BackgroundSubtractorMOG2>),
    Knn(Ptr<BackgroundSubtractorKNN>),
}

/// OpenCV background subtractor wrapper
pub struct OpenCvBackgroundModel {
    subtractor: Subtractor,
    dimensions: (u32, u32),
    frames: u64,
}

impl OpenCvBackgroundModel {
    pub fn new(config: &MotionConfig) -> Result<Self> {
        let tuning = &config.backend;
        let history = tuning.history as i32;

        let subtractor = match config.algorithm {
            BackgroundAlgorithm::Mog2 => Subtractor::Mog2(
                video::create_background_subtractor_mog2(
                    history,
                    tuning.var_threshold,
                    tuning.detect_shadows,
                )
                .map_err(|e| cv_error("Failed to create MOG2 subtractor", e))?,
            ),
            BackgroundAlgorithm::Knn => Subtractor::Knn(
                video::create_background_subtractor_knn(
                    history,
                    tuning.dist2_threshold,
                    tuning.detect_shadows,
                )
                .map_err(|e| cv_error("Failed to create KNN subtractor", e))?,
            ),
        };

        debug!(algorithm = ?config.algorithm, "Created OpenCV background subtractor");

        Ok(Self {
            subtractor,
            dimensions: (0, 0),
            frames: 0,
        })
    }
}

impl BackgroundModel for OpenCvBackgroundModel {
    fn apply(&mut self, frame: &GrayImage) -> Result<GrayImage> {
        if self.frames == 0 {
            self.dimensions = frame.dimensions();
        } else {
            check_dimensions(self.dimensions, frame)?;
        }

        let input = gray_to_mat(frame)?;
        let mut mask = Mat::default();
        match &mut self.subtractor {
            Subtractor::Mog2(s) => s.apply(&input, &mut mask, -1.0),
            Subtractor::Knn(s) => s.apply(&input, &mut mask, -1.0),
        }
        .map_err(|e| cv_error("Failed to apply background subtractor", e))?;

        self.frames += 1;

        // The first frame only seeds the model
        if self.frames == 1 {
            return Ok(GrayImage::new(frame.width(), frame.height()));
        }

        mat_to_gray(&mask, frame.width(), frame.height())
    }

    fn frames_seen(&self) -> u64 {
        self.frames
    }

    fn algorithm_name(&self) -> &'static str {
        match self.subtractor {
            Subtractor::Mog2(_) => "MOG2",
            Subtractor::Knn(_) => "KNN",
        }
    }
}
