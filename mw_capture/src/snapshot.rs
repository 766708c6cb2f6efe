//! ABOUTME: PNG snapshot sink writing motion evidence frames to a directory
//! ABOUTME: File names carry the local time of the snapshot, e.g. motion_20240301_123005.png

use metrics::counter;
use mw_core::{filename_timestamp, Error, Result};
use mw_vision::{Frame, SnapshotSink};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// Writes un-annotated frames as PNG files
#[derive(Debug)]
pub struct PngSnapshotSink {
    directory: PathBuf,
    written: u64,
}

impl PngSnapshotSink {
    /// Create the directory (recursively) so the first write cannot fail on it
    pub fn create(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory).map_err(|e| {
            Error::Config(format!(
                "Cannot create snapshot directory {}: {}",
                directory.display(),
                e
            ))
        })?;

        info!(directory = %directory.display(), "Saving motion snapshots");
        Ok(Self {
            directory,
            written: 0,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Path a snapshot taken at `at` is written to
    pub fn path_for(&self, at: SystemTime) -> PathBuf {
        self.directory
            .join(format!("motion_{}.png", filename_timestamp(at)))
    }
}

impl SnapshotSink for PngSnapshotSink {
    fn save(&mut self, frame: &Frame, at: SystemTime) -> Result<PathBuf> {
        let path = self.path_for(at);
        frame.image().save(&path)?;

        self.written += 1;
        counter!("snapshots_written_total").increment(1);
        debug!(path = %path.display(), "Snapshot written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mw_vision::utils::{create_rgb_frame_with_block, timestamp_millis};
    use mw_vision::Rect;
    use tempfile::TempDir;

    #[test]
    fn test_creates_nested_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");

        let sink = PngSnapshotSink::create(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(sink.directory(), nested.as_path());
    }

    #[test]
    fn test_save_writes_png_named_by_timestamp() {
        let dir = TempDir::new().unwrap();
        let mut sink = PngSnapshotSink::create(dir.path()).unwrap();

        let at = timestamp_millis(1_700_000_000_000);
        let frame = create_rgb_frame_with_block(32, 24, Rect::new(4, 4, 8, 8), 200, 0);
        let path = sink.save(&frame, at).unwrap();

        assert_eq!(path, sink.path_for(at));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("motion_"));
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), "motion_YYYYMMDD_HHMMSS.png".len());

        let written = mw_vision::image::open(&path).unwrap().to_rgb8();
        assert_eq!(written.dimensions(), (32, 24));
        assert_eq!(written.get_pixel(5, 5).0, [200; 3]);
        assert_eq!(sink.written(), 1);
    }

    #[test]
    fn test_directory_blocked_by_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("taken");
        std::fs::write(&blocker, "file").unwrap();

        let result = PngSnapshotSink::create(blocker.join("snapshots"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
