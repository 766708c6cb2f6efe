//! ABOUTME: Command-line surface of the motionwatch binary
//! ABOUTME: Maps flags onto configuration overrides layered above file and environment

use clap::Parser;
use mw_config::ConfigLoader;
use mw_core::Result;
use mw_vision::{BackgroundAlgorithm, Rect};
use std::path::PathBuf;

/// Detect motion in a camera feed, video file or image sequence
#[derive(Debug, Parser)]
#[command(name = "motionwatch", version)]
pub struct Cli {
    /// Camera device index
    #[arg(long, value_name = "INDEX")]
    pub camera: Option<u32>,

    /// Read frames from a video file instead of a camera
    #[arg(long, value_name = "FILE")]
    pub video: Option<String>,

    /// Read frames from a directory of images, in name order
    #[arg(long, value_name = "DIR")]
    pub images: Option<String>,

    /// Scale factor applied to every frame, in (0, 1]
    #[arg(long, value_name = "FACTOR")]
    pub resize: Option<f64>,

    /// Frames to skip between analysed frames
    #[arg(long, value_name = "N")]
    pub skip: Option<u32>,

    /// Foreground likelihood threshold (0-255)
    #[arg(long)]
    pub threshold: Option<u8>,

    /// Minimum contour area of a motion region, in pixels
    #[arg(long, value_name = "PIXELS")]
    pub min_area: Option<f64>,

    /// Background subtractor: mog2 or knn
    #[arg(long, value_name = "ALGORITHM")]
    pub bg: Option<String>,

    /// Region of interest as x,y,width,height
    #[arg(long, value_name = "X,Y,W,H")]
    pub roi: Option<String>,

    /// Gaussian blur kernel size (even sizes are rounded up)
    #[arg(long, value_name = "SIZE")]
    pub blur_kernel: Option<u32>,

    /// Erosion iterations on the foreground mask
    #[arg(long, value_name = "N")]
    pub erode: Option<u32>,

    /// Dilation iterations on the foreground mask
    #[arg(long, value_name = "N")]
    pub dilate: Option<u32>,

    /// Show the foreground mask next to the frame
    #[arg(long)]
    pub show_mask: bool,

    /// Save throttled snapshots of motion frames, optionally into DIR
    #[arg(long, value_name = "DIR", num_args = 0..=1, default_missing_value = "snapshots")]
    pub save_snapshots: Option<String>,

    /// Append motion and snapshot events to FILE
    #[arg(long, value_name = "FILE")]
    pub log: Option<String>,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write annotated frames (and masks) to DIR
    #[arg(long, value_name = "DIR")]
    pub annotate_dir: Option<String>,

    /// Show frames in a window (requires heavy_opencv)
    #[arg(long)]
    pub window: bool,

    /// Use OpenCV for capture and background subtraction (requires heavy_opencv)
    #[arg(long)]
    pub opencv: bool,

    /// Diagnostic log format: pretty or json
    #[arg(long, value_name = "FORMAT")]
    pub log_format: Option<String>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    pub summary_json: bool,
}

impl Cli {
    /// Loader with the config file and every flag the user passed
    pub fn loader(&self) -> Result<ConfigLoader> {
        let mut loader = ConfigLoader::new();
        if let Some(path) = &self.config {
            loader = loader.with_file(path);
        }

        if let Some(index) = self.camera {
            loader = loader.set("source.camera_index", index as i64);
        }
        if let Some(video) = &self.video {
            loader = loader.set("source.video_path", video.as_str());
        }
        if let Some(images) = &self.images {
            loader = loader.set("source.image_dir", images.as_str());
        }
        if let Some(resize) = self.resize {
            loader = loader.set("detection.resize_factor", resize);
        }
        if let Some(skip) = self.skip {
            loader = loader.set("detection.frame_skip", skip as i64);
        }
        if let Some(threshold) = self.threshold {
            loader = loader.set("detection.threshold", threshold as i64);
        }
        if let Some(min_area) = self.min_area {
            loader = loader.set("detection.min_area", min_area);
        }
        if let Some(bg) = &self.bg {
            let algorithm: BackgroundAlgorithm = bg.parse()?;
            loader = loader.set("detection.algorithm", algorithm.to_string());
        }
        if let Some(roi) = &self.roi {
            let roi: Rect = roi.parse()?;
            loader = loader
                .set("detection.roi.x", roi.x as i64)
                .set("detection.roi.y", roi.y as i64)
                .set("detection.roi.width", roi.width as i64)
                .set("detection.roi.height", roi.height as i64);
        }
        if let Some(kernel) = self.blur_kernel {
            loader = loader.set("detection.blur_kernel", kernel as i64);
        }
        if let Some(erode) = self.erode {
            loader = loader.set("detection.erode_iterations", erode as i64);
        }
        if let Some(dilate) = self.dilate {
            loader = loader.set("detection.dilate_iterations", dilate as i64);
        }
        if self.show_mask {
            loader = loader.set("display.show_mask", true);
        }
        if let Some(dir) = &self.save_snapshots {
            loader = loader
                .set("snapshots.enabled", true)
                .set("snapshots.directory", dir.as_str());
        }
        if let Some(log) = &self.log {
            loader = loader.set("logging.event_log", log.as_str());
        }
        if let Some(dir) = &self.annotate_dir {
            loader = loader.set("display.annotate_dir", dir.as_str());
        }
        if self.window {
            loader = loader.set("display.window", true);
        }
        if self.opencv {
            loader = loader
                .set("source.use_opencv", true)
                .set("detection.backend.use_opencv", true);
        }
        if let Some(format) = &self.log_format {
            loader = loader.set("logging.format", format.to_ascii_lowercase());
        }

        Ok(loader)
    }
}
