//! ABOUTME: Adaptive background models producing per-pixel foreground likelihood
//! ABOUTME: Runtime selection between Gaussian-mixture and sample-based (KNN) estimators

use crate::{BackgroundAlgorithm, MotionConfig};
use image::GrayImage;
use mw_core::{Error, Result};
use tracing::{info, warn};

pub mod knn;
pub mod mog2;
#[cfg(feature = "heavy_opencv")]
pub mod opencv;

pub use knn::KnnModel;
pub use mog2::Mog2Model;
#[cfg(feature = "heavy_opencv")]
pub use opencv::OpenCvBackgroundModel;

/// Mask value for pixels that match the background
pub const BACKGROUND: u8 = 0;
/// Mask value for pixels classified as shadow of a foreground object
pub const SHADOW: u8 = 127;
/// Mask value for foreground pixels
pub const FOREGROUND: u8 = 255;

/// Stateful estimator of background pixel statistics
///
/// Every call to [`BackgroundModel::apply`] both classifies the frame and
/// learns from it; there is no separate training phase. Frames must keep the
/// dimensions of the first frame seen.
pub trait BackgroundModel: Send {
    /// Classify a preprocessed frame and update the model with it
    fn apply(&mut self, frame: &GrayImage) -> Result<GrayImage>;

    /// Number of frames the model has learned from
    fn frames_seen(&self) -> u64;

    /// Get algorithm name
    fn algorithm_name(&self) -> &'static str;
}

/// Build the configured background model
pub fn create_background_model(config: &MotionConfig) -> Result<Box<dyn BackgroundModel>> {
    if config.backend.use_opencv {
        #[cfg(feature = "heavy_opencv")]
        {
            info!(algorithm = ?config.algorithm, "Creating OpenCV background model");
            return Ok(Box::new(OpenCvBackgroundModel::new(config)?));
        }
        #[cfg(not(feature = "heavy_opencv"))]
        {
            warn!("OpenCV backend requested but heavy_opencv feature not enabled, using native model");
        }
    }

    let model: Box<dyn BackgroundModel> = match config.algorithm {
        BackgroundAlgorithm::Mog2 => {
            info!("Creating MOG2 background model");
            Box::new(Mog2Model::new(&config.backend))
        }
        BackgroundAlgorithm::Knn => {
            info!("Creating KNN background model");
            Box::new(KnnModel::new(&config.backend))
        }
    };
    Ok(model)
}

/// Reject frames whose size differs from the one the model was seeded with
pub(crate) fn check_dimensions(expected: (u32, u32), frame: &GrayImage) -> Result<()> {
    if frame.dimensions() != expected {
        return Err(Error::Validation(format!(
            "Frame size changed from {}x{} to {}x{}",
            expected.0,
            expected.1,
            frame.width(),
            frame.height()
        )));
    }
    Ok(())
}

/// Learning rate for the n-th frame (1-based) given a history length
pub(crate) fn learning_rate(frame_number: u64, history: u32) -> f32 {
    let window = (2 * frame_number).min(history.max(1) as u64).max(1);
    1.0 / window as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::create_test_frame_with_motion;

    #[test]
    fn test_factory_selects_algorithm() {
        let mog2 = create_background_model(&MotionConfig::default()).unwrap();
        assert_eq!(mog2.algorithm_name(), "MOG2");

        let config = MotionConfig {
            algorithm: BackgroundAlgorithm::Knn,
            ..Default::default()
        };
        let knn = create_background_model(&config).unwrap();
        assert_eq!(knn.algorithm_name(), "KNN");
    }

    #[cfg(not(feature = "heavy_opencv"))]
    #[test]
    fn test_opencv_request_falls_back_to_native() {
        let mut config = MotionConfig::default();
        config.backend.use_opencv = true;
        let model = create_background_model(&config).unwrap();
        assert_eq!(model.algorithm_name(), "MOG2");
    }

    #[test]
    fn test_learning_rate_schedule() {
        assert_eq!(learning_rate(1, 500), 0.5);
        assert_eq!(learning_rate(2, 500), 0.25);
        assert_eq!(learning_rate(1000, 500), 1.0 / 500.0);
        assert_eq!(learning_rate(10, 0), 1.0);
    }

    #[test]
    fn test_check_dimensions() {
        let frame = create_test_frame_with_motion(10, 8, 0, 0, 0, 0, 0);
        assert!(check_dimensions((10, 8), &frame).is_ok());
        assert!(matches!(
            check_dimensions((8, 10), &frame),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_both_models_warm_up_silently() {
        for algorithm in [BackgroundAlgorithm::Mog2, BackgroundAlgorithm::Knn] {
            let config = MotionConfig {
                algorithm,
                ..Default::default()
            };
            let mut model = create_background_model(&config).unwrap();
            let frame = create_test_frame_with_motion(32, 32, 4, 4, 10, 10, 200);
            let mask = model.apply(&frame).unwrap();
            assert!(mask.pixels().all(|p| p.0[0] == BACKGROUND));
            assert_eq!(model.frames_seen(), 1);
        }
    }
}
