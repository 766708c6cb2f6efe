//! ABOUTME: Per-frame motion pipeline wiring scheduler, preprocessing, model and decision
//! ABOUTME: Skipped frames bypass every stateful stage and come back as a distinct outcome

use crate::{
    create_background_model, BackgroundModel, BinaryMask, Frame, FrameDisposition,
    FrameScheduler, MaskProcessor, MotionConfig, MotionVerdict, Preprocessor, Rect,
    RegionExtractor,
};
use metrics::{counter, histogram};
use mw_core::{Stopwatch, Result};
use tracing::{debug, info};

/// A frame that was read but not analysed
#[derive(Debug, Clone)]
pub struct SkippedFrame {
    pub index: u64,
    /// Frame after resizing
    pub frame: Frame,
}

/// A frame that went through the whole pipeline
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    pub index: u64,
    /// Frame after resizing, without annotations
    pub frame: Frame,
    /// Cleaned, ROI-restricted foreground mask
    pub mask: BinaryMask,
    pub verdict: MotionVerdict,
}

/// Result of feeding one frame to the pipeline
#[derive(Debug, Clone)]
pub enum FrameOutcome {
    Skipped(SkippedFrame),
    Processed(ProcessedFrame),
}

impl FrameOutcome {
    pub fn index(&self) -> u64 {
        match self {
            Self::Skipped(skipped) => skipped.index,
            Self::Processed(processed) => processed.index,
        }
    }

    pub fn frame(&self) -> &Frame {
        match self {
            Self::Skipped(skipped) => &skipped.frame,
            Self::Processed(processed) => &processed.frame,
        }
    }

    /// True only for processed frames with motion
    pub fn motion_detected(&self) -> bool {
        matches!(self, Self::Processed(processed) if processed.verdict.detected)
    }
}

/// Stateful per-run motion detector
pub struct MotionPipeline {
    preprocessor: Preprocessor,
    background: Box<dyn BackgroundModel>,
    masks: MaskProcessor,
    extractor: RegionExtractor,
    scheduler: FrameScheduler,
}

impl MotionPipeline {
    /// Validate the configuration and resolve the ROI against the first frame
    ///
    /// The first frame is only inspected for its dimensions; it still has to
    /// be passed to [`MotionPipeline::process`].
    pub fn start(config: &MotionConfig, first: &Frame) -> Result<Self> {
        config.check()?;

        let preprocessor = Preprocessor::new(config);
        let (width, height) = preprocessor.scaled_dimensions(first.width(), first.height());
        let scheduler = FrameScheduler::initialize(config, width, height);
        let background = create_background_model(config)?;

        info!(
            source_width = first.width(),
            source_height = first.height(),
            width,
            height,
            algorithm = background.algorithm_name(),
            kernel = preprocessor.kernel_size(),
            threshold = config.threshold,
            min_area = config.min_area,
            "Motion pipeline started"
        );

        Ok(Self {
            preprocessor,
            background,
            masks: MaskProcessor::new(config),
            extractor: RegionExtractor::new(config),
            scheduler,
        })
    }

    /// Run one frame through the pipeline
    pub fn process(&mut self, frame: Frame) -> Result<FrameOutcome> {
        let frame = self.preprocessor.resize(frame);
        let (index, disposition) = self.scheduler.next_frame();

        if disposition == FrameDisposition::Skip {
            counter!("frames_skipped_total").increment(1);
            debug!(index, "Frame skipped");
            return Ok(FrameOutcome::Skipped(SkippedFrame { index, frame }));
        }

        let stopwatch = Stopwatch::start();
        let gray = self.preprocessor.prepare(&frame);
        let likelihood = self.background.apply(&gray)?;
        let mask = self.masks.process(&likelihood, &self.scheduler.roi())?;
        let regions = self.extractor.extract(&mask)?;
        let verdict = MotionVerdict::decide(regions, frame.captured_at());

        let elapsed = stopwatch.elapsed();
        counter!("frames_processed_total").increment(1);
        histogram!("frame_processing_seconds").record(elapsed.as_secs_f64());
        if verdict.detected {
            counter!("motion_frames_total").increment(1);
        }

        debug!(
            index,
            detected = verdict.detected,
            regions = verdict.region_count(),
            foreground = mask.count(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Frame processed"
        );

        Ok(FrameOutcome::Processed(ProcessedFrame {
            index,
            frame,
            mask,
            verdict,
        }))
    }

    /// Effective region of interest, frozen at start
    pub fn roi(&self) -> Rect {
        self.scheduler.roi()
    }

    /// Frames the background model has learned from
    pub fn frames_learned(&self) -> u64 {
        self.background.frames_seen()
    }

    pub fn algorithm_name(&self) -> &'static str {
        self.background.algorithm_name()
    }
}
