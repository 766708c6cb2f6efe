//! ABOUTME: Frame sources and side-effect sinks for the motion monitor
//! ABOUTME: Chooses a capture backend from configuration and provides disk-backed sinks

use mw_config::{SourceConfig, SourceKind};
use mw_core::Result;
use mw_vision::FrameSource;
use tracing::debug;

pub mod event_log;
pub mod ffmpeg_source;
pub mod image_source;
#[cfg(feature = "heavy_opencv")]
pub mod opencv;
pub mod render;
pub mod snapshot;

pub use event_log::FileEventLogger;
pub use ffmpeg_source::{FfmpegInput, FfmpegSource};
pub use image_source::ImageSequenceSource;
#[cfg(feature = "heavy_opencv")]
pub use opencv::{OpenCvSource, WindowRenderer};
pub use render::{AnnotatedFrameWriter, LogRenderer};
pub use snapshot::PngSnapshotSink;

/// Open the frame source described by the configuration
pub fn open_frame_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    let kind = config.kind();
    debug!(source = ?kind, use_opencv = config.use_opencv, "Opening frame source");

    match (kind, config.use_opencv) {
        (SourceKind::Images(dir), _) => Ok(Box::new(ImageSequenceSource::open(dir)?)),
        (kind, true) => open_opencv(&kind),
        (SourceKind::Camera(index), false) => open_ffmpeg(FfmpegInput::Camera(index), config),
        (SourceKind::Video(path), false) => open_ffmpeg(FfmpegInput::File(path), config),
    }
}

fn open_ffmpeg(input: FfmpegInput, config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(FfmpegSource::open(
        input,
        &config.ffmpeg_path,
        &config.ffprobe_path,
    )?))
}

#[cfg(feature = "heavy_opencv")]
fn open_opencv(kind: &SourceKind) -> Result<Box<dyn FrameSource>> {
    match kind {
        SourceKind::Camera(index) => Ok(Box::new(OpenCvSource::open_camera(*index)?)),
        SourceKind::Video(path) => Ok(Box::new(OpenCvSource::open_file(path)?)),
        SourceKind::Images(dir) => Ok(Box::new(ImageSequenceSource::open(dir)?)),
    }
}

#[cfg(not(feature = "heavy_opencv"))]
fn open_opencv(_kind: &SourceKind) -> Result<Box<dyn FrameSource>> {
    Err(mw_core::Error::Config(
        "OpenCV capture requested but motionwatch was built without heavy_opencv".to_string(),
    ))
}
