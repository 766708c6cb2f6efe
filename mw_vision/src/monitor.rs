//! ABOUTME: Capture loop that drives the pipeline and performs its side effects
//! ABOUTME: Defines the frame source, renderer, snapshot sink and event logger seams

use crate::{
    annotate::annotate_regions, BinaryMask, Frame, FrameOutcome, MotionConfig, MotionPipeline,
    ProcessedFrame, Region, SkippedFrame, SnapshotThrottle,
};
use image::RgbImage;
use metrics::counter;
use mw_core::{display_timestamp, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Produces decoded frames in capture order
pub trait FrameSource {
    /// Next frame, or `None` at end of stream
    fn read_next(&mut self) -> Result<Option<Frame>>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Everything a renderer needs to show one frame
#[derive(Debug)]
pub struct RenderView<'a> {
    pub index: u64,
    /// Frame with region outlines drawn on it
    pub image: &'a RgbImage,
    /// Display timestamp; absent on skipped frames
    pub timestamp: Option<&'a str>,
    pub motion_detected: bool,
    pub regions: &'a [Region],
    /// Foreground mask, present when the mask view is enabled
    pub mask: Option<&'a BinaryMask>,
}

/// Presents frames to the user
pub trait Renderer {
    /// Show the frame; returns true when the user asked to exit
    fn render(&mut self, view: &RenderView<'_>) -> Result<bool>;
}

/// Persists evidence frames
pub trait SnapshotSink {
    /// Write the frame and return where it went
    fn save(&mut self, frame: &Frame, at: SystemTime) -> Result<PathBuf>;
}

/// Appends human-readable event lines
///
/// Implementations deal with their own I/O failures.
pub trait EventLogger {
    fn log_line(&mut self, line: &str);
}

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    EndOfStream,
    UserExit,
}

/// Counters reported when the loop ends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub frames_read: u64,
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub motion_frames: u64,
    pub snapshots_saved: u64,
    pub snapshot_failures: u64,
    pub stop_reason: StopReason,
}

/// Orchestrates one monitoring run
pub struct Monitor {
    config: MotionConfig,
    renderer: Box<dyn Renderer>,
    snapshots: Option<Box<dyn SnapshotSink>>,
    event_log: Option<Box<dyn EventLogger>>,
    show_mask: bool,
    throttle: SnapshotThrottle,
}

impl Monitor {
    pub fn new(config: MotionConfig, renderer: Box<dyn Renderer>) -> Self {
        Self {
            config,
            renderer,
            snapshots: None,
            event_log: None,
            show_mask: false,
            throttle: SnapshotThrottle::new(),
        }
    }

    /// Enable throttled snapshots on motion frames
    pub fn with_snapshots(mut self, sink: Box<dyn SnapshotSink>) -> Self {
        self.snapshots = Some(sink);
        self
    }

    pub fn with_event_log(mut self, logger: Box<dyn EventLogger>) -> Self {
        self.event_log = Some(logger);
        self
    }

    /// Pass the foreground mask to the renderer
    pub fn show_mask(mut self, show: bool) -> Self {
        self.show_mask = show;
        self
    }

    /// Read and process frames until the stream ends or the user exits
    pub fn run(&mut self, source: &mut dyn FrameSource) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        info!(source = %source.describe(), "Starting motion monitor");

        let Some(first) = Self::read_frame(source, &mut summary)? else {
            info!("Frame source produced no frames");
            return Ok(summary);
        };

        let mut pipeline = MotionPipeline::start(&self.config, &first)?;
        let mut next = Some(first);

        while let Some(frame) = next {
            let exit_requested = match pipeline.process(frame)? {
                FrameOutcome::Skipped(skipped) => {
                    summary.frames_skipped += 1;
                    self.show_skipped(&skipped)?
                }
                FrameOutcome::Processed(processed) => {
                    summary.frames_processed += 1;
                    self.handle_processed(&processed, &mut summary)?
                }
            };

            if exit_requested {
                info!("Exit requested by user");
                summary.stop_reason = StopReason::UserExit;
                break;
            }
            next = Self::read_frame(source, &mut summary)?;
        }

        info!(
            frames_read = summary.frames_read,
            frames_processed = summary.frames_processed,
            frames_skipped = summary.frames_skipped,
            motion_frames = summary.motion_frames,
            snapshots = summary.snapshots_saved,
            stop_reason = ?summary.stop_reason,
            "Motion monitor finished"
        );
        Ok(summary)
    }

    fn read_frame(source: &mut dyn FrameSource, summary: &mut RunSummary) -> Result<Option<Frame>> {
        match source.read_next()? {
            Some(frame) if !frame.is_empty() => {
                summary.frames_read += 1;
                Ok(Some(frame))
            }
            Some(_) => {
                debug!("Empty frame received, treating as end of stream");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn show_skipped(&mut self, skipped: &SkippedFrame) -> Result<bool> {
        let empty_mask = self
            .show_mask
            .then(|| BinaryMask::new(skipped.frame.width(), skipped.frame.height()));

        self.renderer.render(&RenderView {
            index: skipped.index,
            image: skipped.frame.image(),
            timestamp: None,
            motion_detected: false,
            regions: &[],
            mask: empty_mask.as_ref(),
        })
    }

    fn handle_processed(
        &mut self,
        processed: &ProcessedFrame,
        summary: &mut RunSummary,
    ) -> Result<bool> {
        let verdict = &processed.verdict;
        let timestamp = display_timestamp(verdict.timestamp);

        if verdict.detected {
            summary.motion_frames += 1;
            self.take_snapshot(processed, summary);

            if let Some(logger) = self.event_log.as_mut() {
                logger.log_line(&format!(
                    "{}: motion detected in {} region(s).",
                    timestamp,
                    verdict.region_count()
                ));
            }
        }

        let annotated = annotate_regions(processed.frame.image(), &verdict.regions);
        self.renderer.render(&RenderView {
            index: processed.index,
            image: &annotated,
            timestamp: Some(&timestamp),
            motion_detected: verdict.detected,
            regions: &verdict.regions,
            mask: self.show_mask.then_some(&processed.mask),
        })
    }

    fn take_snapshot(&mut self, processed: &ProcessedFrame, summary: &mut RunSummary) {
        let Some(sink) = self.snapshots.as_mut() else {
            return;
        };
        let fired_at = processed.verdict.timestamp;
        if !self.throttle.maybe_fire(&processed.verdict, fired_at) {
            return;
        }

        match sink.save(&processed.frame, fired_at) {
            Ok(path) => {
                summary.snapshots_saved += 1;
                info!(path = %path.display(), index = processed.index, "Snapshot saved");
                if let Some(logger) = self.event_log.as_mut() {
                    logger.log_line(&format!(
                        "{}: snapshot saved to {}",
                        display_timestamp(fired_at),
                        path.display()
                    ));
                }
            }
            Err(e) => {
                summary.snapshot_failures += 1;
                counter!("snapshot_write_failures_total").increment(1);
                warn!(error = %e, index = processed.index, "Failed to save snapshot");
            }
        }
    }
}
