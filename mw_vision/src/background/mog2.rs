//! ABOUTME: Adaptive Gaussian mixture background model (MOG2 style)
//! ABOUTME: Keeps up to five weighted Gaussian modes per pixel with shadow detection

use super::{check_dimensions, learning_rate, BackgroundModel, BACKGROUND, FOREGROUND, SHADOW};
use crate::BackgroundTuning;
use image::GrayImage;
use mw_core::Result;
use tracing::debug;

const MAX_MODES: usize = 5;

/// Tuning constants of the mixture model
#[derive(Debug, Clone)]
pub struct Mog2Params {
    pub history: u32,
    /// Squared Mahalanobis distance below which a mode explains the pixel as background
    pub var_threshold: f32,
    /// Squared distance below which a pixel updates an existing mode instead of spawning one
    pub var_threshold_gen: f32,
    pub var_init: f32,
    pub var_min: f32,
    pub var_max: f32,
    /// Cumulative weight of the modes that make up the background
    pub background_ratio: f32,
    /// Weight decay applied to unsupported modes
    pub complexity_reduction: f32,
    pub detect_shadows: bool,
    /// Darkening ratio accepted as a shadow (0.5 = up to twice as dark)
    pub shadow_threshold: f32,
}

impl Default for Mog2Params {
    fn default() -> Self {
        Self {
            history: 500,
            var_threshold: 16.0,
            var_threshold_gen: 9.0,
            var_init: 15.0,
            var_min: 4.0,
            var_max: 75.0,
            background_ratio: 0.9,
            complexity_reduction: 0.05,
            detect_shadows: true,
            shadow_threshold: 0.5,
        }
    }
}

impl From<&BackgroundTuning> for Mog2Params {
    fn from(tuning: &BackgroundTuning) -> Self {
        Self {
            history: tuning.history,
            var_threshold: tuning.var_threshold as f32,
            detect_shadows: tuning.detect_shadows,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Mode {
    weight: f32,
    mean: f32,
    variance: f32,
}

/// Per-pixel Gaussian mixture background model
pub struct Mog2Model {
    params: Mog2Params,
    dimensions: (u32, u32),
    modes: Vec<Mode>,
    mode_counts: Vec<u8>,
    frames: u64,
}

impl Mog2Model {
    pub fn new(tuning: &BackgroundTuning) -> Self {
        Self::with_params(Mog2Params::from(tuning))
    }

    pub fn with_params(params: Mog2Params) -> Self {
        debug!(
            history = params.history,
            var_threshold = params.var_threshold,
            detect_shadows = params.detect_shadows,
            "Created MOG2 background model"
        );
        Self {
            params,
            dimensions: (0, 0),
            modes: Vec::new(),
            mode_counts: Vec::new(),
            frames: 0,
        }
    }

    /// First frame: one mode per pixel centred on the observed value
    fn seed(&mut self, frame: &GrayImage) -> GrayImage {
        self.dimensions = frame.dimensions();
        let pixels = frame.as_raw();
        self.modes = vec![Mode::default(); pixels.len() * MAX_MODES];
        self.mode_counts = vec![1; pixels.len()];

        for (i, &value) in pixels.iter().enumerate() {
            self.modes[i * MAX_MODES] = Mode {
                weight: 1.0,
                mean: value as f32,
                variance: self.params.var_init,
            };
        }

        GrayImage::new(frame.width(), frame.height())
    }

    /// Update one pixel's mixture and classify it
    fn update_pixel(&self, modes: &mut [Mode], count: &mut u8, value: f32, alpha: f32) -> u8 {
        let p = &self.params;
        let one_minus_alpha = 1.0 - alpha;
        let prune = -alpha * p.complexity_reduction;

        let mut fits = false;
        let mut background = false;
        let mut total_weight = 0.0f32;
        let mut used = *count as usize;

        let mut mode = 0;
        while mode < used {
            let mut weight = one_minus_alpha * modes[mode].weight + prune;
            let mut slot = mode;

            if !fits {
                let variance = modes[mode].variance;
                let diff = modes[mode].mean - value;
                let dist2 = diff * diff;

                if total_weight < p.background_ratio && dist2 < p.var_threshold * variance {
                    background = true;
                }

                if dist2 < p.var_threshold_gen * variance {
                    fits = true;
                    weight += alpha;
                    let k = alpha / weight;
                    modes[mode].mean -= k * diff;
                    modes[mode].variance =
                        (variance + k * (dist2 - variance)).clamp(p.var_min, p.var_max);

                    // Keep modes ordered by weight
                    while slot > 0 && weight >= modes[slot - 1].weight {
                        modes.swap(slot, slot - 1);
                        slot -= 1;
                    }
                }
            }

            if weight < -prune {
                weight = 0.0;
                used -= 1;
            }

            modes[slot].weight = weight;
            total_weight += weight;
            mode += 1;
        }

        if total_weight > 0.0 {
            let norm = 1.0 / total_weight;
            for m in modes[..used].iter_mut() {
                m.weight *= norm;
            }
        }

        if !fits {
            let slot = if used == MAX_MODES {
                MAX_MODES - 1
            } else {
                used += 1;
                used - 1
            };

            if used == 1 {
                modes[slot].weight = 1.0;
            } else {
                modes[slot].weight = alpha;
                for m in modes[..used - 1].iter_mut() {
                    m.weight *= one_minus_alpha;
                }
            }
            modes[slot].mean = value;
            modes[slot].variance = p.var_init;

            let mut i = slot;
            while i > 0 && alpha >= modes[i - 1].weight {
                modes.swap(i, i - 1);
                i -= 1;
            }
        }

        *count = used as u8;

        if background {
            BACKGROUND
        } else if p.detect_shadows && self.is_shadow(&modes[..used], value) {
            SHADOW
        } else {
            FOREGROUND
        }
    }

    /// A pixel is a shadow when it is a uniformly darker copy of a background mode
    fn is_shadow(&self, modes: &[Mode], value: f32) -> bool {
        let p = &self.params;
        let mut weight_sum = 0.0f32;

        for mode in modes {
            let numerator = mode.mean * value;
            let denominator = mode.mean * mode.mean;
            if denominator == 0.0 {
                return false;
            }

            if numerator <= denominator && numerator >= p.shadow_threshold * denominator {
                let a = numerator / denominator;
                let diff = a * mode.mean - value;
                if diff * diff < p.var_threshold * mode.variance * a * a {
                    return true;
                }
            }

            weight_sum += mode.weight;
            if weight_sum > p.background_ratio {
                return false;
            }
        }

        false
    }
}

impl BackgroundModel for Mog2Model {
    fn apply(&mut self, frame: &GrayImage) -> Result<GrayImage> {
        if self.frames == 0 {
            self.frames = 1;
            return Ok(self.seed(frame));
        }
        check_dimensions(self.dimensions, frame)?;

        self.frames += 1;
        let alpha = learning_rate(self.frames, self.params.history);

        let mut modes = std::mem::take(&mut self.modes);
        let mut counts = std::mem::take(&mut self.mode_counts);
        let mut mask = GrayImage::new(frame.width(), frame.height());

        for (i, (&value, out)) in frame
            .as_raw()
            .iter()
            .zip(mask.iter_mut())
            .enumerate()
        {
            let pixel_modes = &mut modes[i * MAX_MODES..(i + 1) * MAX_MODES];
            *out = self.update_pixel(pixel_modes, &mut counts[i], value as f32, alpha);
        }

        self.modes = modes;
        self.mode_counts = counts;
        Ok(mask)
    }

    fn frames_seen(&self) -> u64 {
        self.frames
    }

    fn algorithm_name(&self) -> &'static str {
        "MOG2"
    }
}
