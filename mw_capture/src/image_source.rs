//! ABOUTME: Frame source that replays a directory of still images in name order
//! ABOUTME: Useful for offline analysis and for deterministic end-to-end tests

use metrics::counter;
use mw_core::{Error, Result};
use mw_vision::{Frame, FrameSource};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

const EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Reads `png`/`jpg` files from a directory, sorted by file name
#[derive(Debug)]
pub struct ImageSequenceSource {
    directory: PathBuf,
    files: Vec<PathBuf>,
    position: usize,
    clock: Option<(SystemTime, Duration)>,
}

impl ImageSequenceSource {
    /// List the directory; it must contain at least one image
    pub fn open(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        if !directory.is_dir() {
            return Err(Error::Source(format!(
                "Image directory does not exist: {}",
                directory.display()
            )));
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(&directory)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(Error::Source(format!(
                "No images found in {}",
                directory.display()
            )));
        }

        info!(
            directory = %directory.display(),
            count = files.len(),
            "Opened image sequence"
        );

        Ok(Self {
            directory,
            files,
            position: 0,
            clock: None,
        })
    }

    /// Stamp frames `start + n * interval` instead of the time they were read
    pub fn with_frame_interval(mut self, start: SystemTime, interval: Duration) -> Self {
        self.clock = Some((start, interval));
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn timestamp(&self, index: usize) -> SystemTime {
        match self.clock {
            Some((start, interval)) => start + interval * index as u32,
            None => SystemTime::now(),
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn read_next(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.files.get(self.position) else {
            return Ok(None);
        };

        debug!(path = %path.display(), "Decoding image");
        let image = mw_vision::image::open(path)
            .map_err(|e| Error::Source(format!("Failed to decode {}: {}", path.display(), e)))?
            .to_rgb8();

        let frame = Frame::new(image, self.timestamp(self.position));
        self.position += 1;
        counter!("capture_frames_read_total").increment(1);
        Ok(Some(frame))
    }

    fn describe(&self) -> String {
        format!(
            "{} images in {}",
            self.files.len(),
            self.directory.display()
        )
    }
}
