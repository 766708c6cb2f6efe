//! ABOUTME: Non-parametric sample-based background model (KNN style)
//! ABOUTME: A pixel is background when enough stored samples lie within a distance threshold

use super::{check_dimensions, BackgroundModel, BACKGROUND, FOREGROUND, SHADOW};
use crate::BackgroundTuning;
use image::GrayImage;
use mw_core::Result;
use tracing::debug;

/// Tuning constants of the sample-based model
#[derive(Debug, Clone)]
pub struct KnnParams {
    pub history: u32,
    /// Samples kept per pixel
    pub samples: usize,
    /// Matching samples required to call a pixel background
    pub k_nearest: usize,
    /// Squared distance below which a sample matches
    pub dist2_threshold: f32,
    pub detect_shadows: bool,
    pub shadow_threshold: f32,
}

impl Default for KnnParams {
    fn default() -> Self {
        Self {
            history: 500,
            samples: 7,
            k_nearest: 3,
            dist2_threshold: 400.0,
            detect_shadows: true,
            shadow_threshold: 0.5,
        }
    }
}

impl From<&BackgroundTuning> for KnnParams {
    fn from(tuning: &BackgroundTuning) -> Self {
        Self {
            history: tuning.history,
            dist2_threshold: tuning.dist2_threshold as f32,
            detect_shadows: tuning.detect_shadows,
            ..Default::default()
        }
    }
}

/// Per-pixel sample set background model
///
/// Sample slots are refreshed in a fixed rotation, one slot every
/// `history / (2 * samples)` frames, so a change that persists for roughly
/// `k_nearest` refresh periods becomes part of the background.
pub struct KnnModel {
    params: KnnParams,
    dimensions: (u32, u32),
    samples: Vec<f32>,
    cursor: usize,
    update_interval: u64,
    frames: u64,
}

impl KnnModel {
    pub fn new(tuning: &BackgroundTuning) -> Self {
        Self::with_params(KnnParams::from(tuning))
    }

    pub fn with_params(mut params: KnnParams) -> Self {
        params.samples = params.samples.max(1);
        params.k_nearest = params.k_nearest.clamp(1, params.samples);
        let update_interval = (params.history as u64 / (2 * params.samples as u64)).max(1);

        debug!(
            history = params.history,
            samples = params.samples,
            k_nearest = params.k_nearest,
            update_interval,
            "Created KNN background model"
        );

        Self {
            params,
            dimensions: (0, 0),
            samples: Vec::new(),
            cursor: 0,
            update_interval,
            frames: 0,
        }
    }

    fn seed(&mut self, frame: &GrayImage) -> GrayImage {
        self.dimensions = frame.dimensions();
        let n = self.params.samples;
        self.samples = frame
            .as_raw()
            .iter()
            .flat_map(|&value| std::iter::repeat(value as f32).take(n))
            .collect();
        GrayImage::new(frame.width(), frame.height())
    }

    fn classify(&self, samples: &[f32], value: f32) -> u8 {
        let p = &self.params;
        let matches = samples
            .iter()
            .filter(|&&s| (s - value) * (s - value) < p.dist2_threshold)
            .count();

        if matches >= p.k_nearest {
            return BACKGROUND;
        }

        if p.detect_shadows {
            let shadow_matches = samples
                .iter()
                .filter(|&&s| {
                    let denominator = s * s;
                    if denominator == 0.0 {
                        return false;
                    }
                    let numerator = s * value;
                    if numerator > denominator || numerator < p.shadow_threshold * denominator {
                        return false;
                    }
                    let a = numerator / denominator;
                    let diff = a * s - value;
                    diff * diff < p.dist2_threshold * a * a
                })
                .count();
            if shadow_matches >= p.k_nearest {
                return SHADOW;
            }
        }

        FOREGROUND
    }
}

impl BackgroundModel for KnnModel {
    fn apply(&mut self, frame: &GrayImage) -> Result<GrayImage> {
        if self.frames == 0 {
            self.frames = 1;
            return Ok(self.seed(frame));
        }
        check_dimensions(self.dimensions, frame)?;
        self.frames += 1;

        let n = self.params.samples;
        let refresh = self.frames % self.update_interval == 0;
        let cursor = self.cursor;
        let mut mask = GrayImage::new(frame.width(), frame.height());

        for (i, (&value, out)) in frame
            .as_raw()
            .iter()
            .zip(mask.iter_mut())
            .enumerate()
        {
            let value = value as f32;
            *out = self.classify(&self.samples[i * n..(i + 1) * n], value);
            if refresh {
                self.samples[i * n + cursor] = value;
            }
        }

        if refresh {
            self.cursor = (cursor + 1) % n;
        }

        Ok(mask)
    }

    fn frames_seen(&self) -> u64 {
        self.frames
    }

    fn algorithm_name(&self) -> &'static str {
        "KNN"
    }
}
