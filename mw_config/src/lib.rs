//! ABOUTME: Configuration management with validation and environment loading
//! ABOUTME: Defaults, then an optional file, then MOTIONWATCH_* variables, then CLI overrides

use config::{Config as ConfigBuilder, Environment, File, Value};
use mw_core::{Error, LogFormat, Result};
use mw_vision::MotionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use validator::Validate;

/// Prefix of environment variables read by the loader
pub const ENV_PREFIX: &str = "MOTIONWATCH";

/// Main configuration struct
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Validate, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub source: SourceConfig,
    #[validate(nested)]
    pub detection: MotionConfig,
    #[validate(nested)]
    pub snapshots: SnapshotConfig,
    pub logging: LoggingConfig,
    pub display: DisplayConfig,
}

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct SourceConfig {
    /// Camera device index, used when no file source is set
    pub camera_index: u32,
    /// Video file to read instead of a camera
    #[validate(length(min = 1))]
    pub video_path: Option<String>,
    /// Directory of still images read in name order
    #[validate(length(min = 1))]
    pub image_dir: Option<String>,
    #[validate(length(min = 1))]
    pub ffmpeg_path: String,
    #[validate(length(min = 1))]
    pub ffprobe_path: String,
    /// Use OpenCV capture instead of ffmpeg (requires heavy_opencv)
    pub use_opencv: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            video_path: None,
            image_dir: None,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            use_opencv: false,
        }
    }
}

/// Resolved frame source selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Camera(u32),
    Video(PathBuf),
    Images(PathBuf),
}

impl SourceConfig {
    /// A video file wins over an image directory, which wins over the camera
    pub fn kind(&self) -> SourceKind {
        if let Some(path) = &self.video_path {
            SourceKind::Video(PathBuf::from(path))
        } else if let Some(dir) = &self.image_dir {
            SourceKind::Images(PathBuf::from(dir))
        } else {
            SourceKind::Camera(self.camera_index)
        }
    }
}

/// Snapshot persistence
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct SnapshotConfig {
    pub enabled: bool,
    #[validate(length(min = 1))]
    pub directory: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: "snapshots".to_string(),
        }
    }
}

/// Diagnostic and event logging
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// File that receives motion and snapshot event lines
    pub event_log: Option<String>,
    /// Tracing output style
    pub format: LogFormat,
}

/// Frame presentation
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DisplayConfig {
    /// Hand the foreground mask to the renderer
    pub show_mask: bool,
    /// Write annotated frames to this directory
    pub annotate_dir: Option<String>,
    /// Open an interactive window (requires heavy_opencv)
    pub window: bool,
}

impl Config {
    /// Load from defaults, environment variables and an optional file
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut loader = ConfigLoader::new();
        if let Some(path) = path {
            loader = loader.with_file(path);
        }
        loader.load()
    }

    /// Validation including checks that span fields
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        self.detection.check()?;

        if self.source.video_path.is_some() && self.source.image_dir.is_some() {
            return Err(Error::Config(
                "A video file and an image directory cannot both be used as source".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder that layers configuration sources
#[derive(Debug, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    overrides: Vec<(String, Value)>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read this file (TOML, YAML or JSON by extension); it must exist
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Override a dotted key, taking priority over every other source
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.overrides.push((key.to_string(), value.into()));
        self
    }

    pub fn load(self) -> Result<Config> {
        let defaults = Config::default();
        let mut builder = ConfigBuilder::builder()
            .set_default("source.camera_index", defaults.source.camera_index as i64)?
            .set_default("source.ffmpeg_path", defaults.source.ffmpeg_path.as_str())?
            .set_default("source.ffprobe_path", defaults.source.ffprobe_path.as_str())?
            .set_default("detection.resize_factor", defaults.detection.resize_factor)?
            .set_default("detection.frame_skip", defaults.detection.frame_skip as i64)?
            .set_default("detection.blur_kernel", defaults.detection.blur_kernel as i64)?
            .set_default("detection.threshold", defaults.detection.threshold as i64)?
            .set_default(
                "detection.erode_iterations",
                defaults.detection.erode_iterations as i64,
            )?
            .set_default(
                "detection.dilate_iterations",
                defaults.detection.dilate_iterations as i64,
            )?
            .set_default("detection.min_area", defaults.detection.min_area)?
            .set_default("detection.algorithm", defaults.detection.algorithm.to_string())?
            .set_default("snapshots.enabled", defaults.snapshots.enabled)?
            .set_default("snapshots.directory", defaults.snapshots.directory.as_str())?
            .set_default("logging.format", "pretty")?;

        if let Some(path) = &self.file {
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        for (key, value) in self.overrides {
            builder = builder.set_override(key, value)?;
        }

        let config = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build config: {}", e)))?;

        let parsed: Config = config
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to deserialize config: {}", e)))?;

        parsed.check()?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mw_vision::{BackgroundAlgorithm, Rect};
    use std::env;
    use std::io::Write;
    use std::sync::Mutex;

    // Use a mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [&str; 4] = [
        "MOTIONWATCH_DETECTION__MIN_AREA",
        "MOTIONWATCH_DETECTION__ALGORITHM",
        "MOTIONWATCH_SNAPSHOTS__ENABLED",
        "MOTIONWATCH_DETECTION__RESIZE_FACTOR",
    ];

    fn clear_env() {
        for key in VARS {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_config_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        let config = Config::load(None).expect("Should load with defaults");

        assert_eq!(config.source.kind(), SourceKind::Camera(0));
        assert_eq!(config.detection, MotionConfig::default());
        assert!(!config.snapshots.enabled);
        assert_eq!(config.snapshots.directory, "snapshots");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.logging.event_log.is_none());
        assert!(!config.display.show_mask);
    }

    #[test]
    fn test_config_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        env::set_var("MOTIONWATCH_DETECTION__MIN_AREA", "750");
        env::set_var("MOTIONWATCH_DETECTION__ALGORITHM", "knn");
        env::set_var("MOTIONWATCH_SNAPSHOTS__ENABLED", "true");

        let config = Config::load(None).expect("Should load from env");

        assert_eq!(config.detection.min_area, 750.0);
        assert_eq!(config.detection.algorithm, BackgroundAlgorithm::Knn);
        assert!(config.snapshots.enabled);

        clear_env();
    }

    #[test]
    fn test_config_validation_failure() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        env::set_var("MOTIONWATCH_DETECTION__RESIZE_FACTOR", "1.5");
        let result = Config::load(None);
        assert!(matches!(result, Err(Error::Config(_))));

        clear_env();
    }

    #[test]
    fn test_config_file_then_overrides() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[detection]
threshold = 40
frame_skip = 3
roi = {{ x = 10, y = 20, width = 100, height = 80 }}

[snapshots]
enabled = true
directory = "/tmp/motion"
"#
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_file(file.path())
            .set("detection.frame_skip", 1i64)
            .set("source.video_path", "clip.mp4")
            .load()
            .unwrap();

        assert_eq!(config.detection.threshold, 40);
        assert_eq!(config.detection.frame_skip, 1);
        assert_eq!(config.detection.roi, Some(Rect::new(10, 20, 100, 80)));
        assert_eq!(config.snapshots.directory, "/tmp/motion");
        assert_eq!(
            config.source.kind(),
            SourceKind::Video(PathBuf::from("clip.mp4"))
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        let result = Config::load(Some(Path::new("/nonexistent/motionwatch.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_conflicting_sources_rejected() {
        let config = Config {
            source: SourceConfig {
                video_path: Some("a.mp4".to_string()),
                image_dir: Some("frames".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.check().is_err());
    }

    #[test]
    fn test_non_positive_roi_rejected() {
        let mut config = Config::default();
        config.detection.roi = Some(Rect::new(0, 0, 10, 0));
        assert!(matches!(config.check(), Err(Error::Config(_))));
    }

    #[test]
    fn test_source_precedence() {
        let source = SourceConfig {
            camera_index: 2,
            image_dir: Some("frames".to_string()),
            ..Default::default()
        };
        assert_eq!(source.kind(), SourceKind::Images(PathBuf::from("frames")));
    }
}
