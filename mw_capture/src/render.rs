//! ABOUTME: Headless renderers for the motion monitor
//! ABOUTME: A log-only renderer and a writer that saves annotated frames and masks to disk

use mw_core::{Error, Result};
use mw_vision::{RenderView, Renderer};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Renders nothing; traces motion frames and never requests exit
#[derive(Debug, Default)]
pub struct LogRenderer {
    rendered: u64,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rendered(&self) -> u64 {
        self.rendered
    }
}

impl Renderer for LogRenderer {
    fn render(&mut self, view: &RenderView<'_>) -> Result<bool> {
        self.rendered += 1;
        if view.motion_detected {
            debug!(
                index = view.index,
                timestamp = view.timestamp.unwrap_or_default(),
                regions = view.regions.len(),
                "MOTION DETECTED"
            );
        }
        Ok(false)
    }
}

/// Writes every rendered frame as `frame_NNNNNN.png`, plus `mask_NNNNNN.png` when a mask is shown
#[derive(Debug)]
pub struct AnnotatedFrameWriter {
    directory: PathBuf,
    written: u64,
}

impl AnnotatedFrameWriter {
    pub fn create(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory).map_err(|e| {
            Error::Config(format!(
                "Cannot create annotation directory {}: {}",
                directory.display(),
                e
            ))
        })?;
        info!(directory = %directory.display(), "Writing annotated frames");
        Ok(Self {
            directory,
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.directory.join(format!("frame_{:06}.png", index))
    }

    pub fn mask_path(&self, index: u64) -> PathBuf {
        self.directory.join(format!("mask_{:06}.png", index))
    }
}

impl Renderer for AnnotatedFrameWriter {
    fn render(&mut self, view: &RenderView<'_>) -> Result<bool> {
        view.image.save(self.frame_path(view.index))?;
        if let Some(mask) = view.mask {
            mask.to_image().save(self.mask_path(view.index))?;
        }
        self.written += 1;
        Ok(false)
    }
}
