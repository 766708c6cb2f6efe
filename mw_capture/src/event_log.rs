//! ABOUTME: Append-only text log of motion and snapshot events
//! ABOUTME: Open failures are reported once and the logger becomes a no-op

use mw_vision::EventLogger;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Appends event lines to a file, flushing after each one
#[derive(Debug)]
pub struct FileEventLogger {
    path: PathBuf,
    file: Option<File>,
}

impl FileEventLogger {
    /// Open `path` for appending; on failure the logger is disabled
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot open event log, event logging disabled");
                None
            }
        };
        Self { path, file }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventLogger for FileEventLogger {
    fn log_line(&mut self, line: &str) {
        let Some(file) = self.file.as_mut() else {
            return;
        };

        if let Err(e) = writeln!(file, "{}", line).and_then(|_| file.flush()) {
            warn!(path = %self.path.display(), error = %e, "Event log write failed, event logging disabled");
            self.file = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_appends_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        std::fs::write(&path, "earlier run\n").unwrap();

        let mut logger = FileEventLogger::open(&path);
        assert!(logger.is_enabled());
        logger.log_line("2024-03-01 12:30:05: motion detected in 1 region(s).");
        logger.log_line("2024-03-01 12:30:06: snapshot saved to snapshots/motion_1.png");

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "earlier run");
        assert!(lines[1].ends_with("motion detected in 1 region(s)."));
    }

    #[test]
    fn test_unopenable_path_disables_logging() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("events.log");

        let mut logger = FileEventLogger::open(&path);
        assert!(!logger.is_enabled());
        logger.log_line("dropped");
        assert!(!path.exists());
    }
}
