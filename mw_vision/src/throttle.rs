//! ABOUTME: Rate limiter for motion snapshots
//! ABOUTME: Fires at most once per whole elapsed second of capture time

use crate::MotionVerdict;
use metrics::counter;
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Minimum whole-second gap between two snapshots
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);

/// Debounces snapshot side effects on motion frames
#[derive(Debug, Clone, Default)]
pub struct SnapshotThrottle {
    last_fired: Option<SystemTime>,
    fired: u64,
}

impl SnapshotThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether this verdict should produce a snapshot
    ///
    /// Only whole seconds count, so a 1.9 s gap fires and a 0.99 s gap does
    /// not. A clock that went backwards is treated as no time elapsed.
    pub fn maybe_fire(&mut self, verdict: &MotionVerdict, now: SystemTime) -> bool {
        if !verdict.detected {
            return false;
        }

        if let Some(last) = self.last_fired {
            let elapsed = now.duration_since(last).unwrap_or(Duration::ZERO);
            if elapsed.as_secs() < SNAPSHOT_INTERVAL.as_secs() {
                debug!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Snapshot suppressed by throttle"
                );
                return false;
            }
        }

        self.last_fired = Some(now);
        self.fired += 1;
        counter!("snapshots_fired_total").increment(1);
        true
    }

    /// Time of the most recent snapshot, if any
    pub fn last_fired(&self) -> Option<SystemTime> {
        self.last_fired
    }

    /// Snapshots fired so far
    pub fn fired(&self) -> u64 {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::timestamp_millis;
    use crate::{Rect, Region};

    fn motion(at: u64) -> MotionVerdict {
        MotionVerdict::decide(
            vec![Region {
                bounds: Rect::new(0, 0, 40, 40),
                area: 1521.0,
                pixel_count: 1600,
            }],
            timestamp_millis(at),
        )
    }

    #[test]
    fn test_first_motion_fires() {
        let mut throttle = SnapshotThrottle::new();
        assert!(throttle.last_fired().is_none());
        assert!(throttle.maybe_fire(&motion(0), timestamp_millis(0)));
        assert_eq!(throttle.last_fired(), Some(timestamp_millis(0)));
    }

    #[test]
    fn test_no_motion_never_fires() {
        let mut throttle = SnapshotThrottle::new();
        let verdict = MotionVerdict::no_motion(timestamp_millis(0));
        assert!(!throttle.maybe_fire(&verdict, timestamp_millis(0)));
        assert!(throttle.last_fired().is_none());
    }

    #[test]
    fn test_fires_at_most_once_per_second() {
        let mut throttle = SnapshotThrottle::new();
        let fired: Vec<u64> = [0u64, 300, 999, 1000, 1500, 1999, 2000, 2100]
            .into_iter()
            .filter(|&t| throttle.maybe_fire(&motion(t), timestamp_millis(t)))
            .collect();
        assert_eq!(fired, vec![0, 1000, 2000]);
        assert_eq!(throttle.fired(), 3);
    }

    #[test]
    fn test_whole_seconds_only() {
        let mut throttle = SnapshotThrottle::new();
        assert!(throttle.maybe_fire(&motion(500), timestamp_millis(500)));
        assert!(!throttle.maybe_fire(&motion(1400), timestamp_millis(1400)));
        assert!(throttle.maybe_fire(&motion(1700), timestamp_millis(1700)));
    }

    #[test]
    fn test_backwards_clock_does_not_fire() {
        let mut throttle = SnapshotThrottle::new();
        assert!(throttle.maybe_fire(&motion(10_000), timestamp_millis(10_000)));
        assert!(!throttle.maybe_fire(&motion(2_000), timestamp_millis(2_000)));
        assert_eq!(throttle.last_fired(), Some(timestamp_millis(10_000)));
    }
}
