//! ABOUTME: Per-frame motion verdict derived from extracted regions
//! ABOUTME: Motion is present exactly when at least one region survived filtering

use crate::Region;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Outcome of analysing one processed frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionVerdict {
    pub detected: bool,
    pub regions: Vec<Region>,
    /// Capture time of the analysed frame
    pub timestamp: SystemTime,
}

impl MotionVerdict {
    /// Build the verdict for a frame's regions
    pub fn decide(regions: Vec<Region>, timestamp: SystemTime) -> Self {
        Self {
            detected: !regions.is_empty(),
            regions,
            timestamp,
        }
    }

    /// Verdict for a frame that was not analysed
    pub fn no_motion(timestamp: SystemTime) -> Self {
        Self::decide(Vec::new(), timestamp)
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }
}
