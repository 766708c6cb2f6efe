// ABOUTME: Utilities for working with times and timestamps.
// ABOUTME: Local-time display and filename formatting plus a stage stopwatch.
use chrono::{DateTime, Local, TimeZone};
use std::time::{Duration, Instant, SystemTime};

/// Format used for overlay text and event log lines
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format used in snapshot file names
pub const FILENAME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Format a timestamp in the given time zone
pub fn format_in<Tz: TimeZone>(time: SystemTime, tz: &Tz, format: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    DateTime::<chrono::Utc>::from(time)
        .with_timezone(tz)
        .format(format)
        .to_string()
}

/// Human-readable local timestamp, e.g. `2024-03-01 12:30:05`
///
/// # Examples
///
/// ```
/// use mw_core::display_timestamp;
/// let text = display_timestamp(std::time::SystemTime::now());
/// assert_eq!(text.len(), 19);
/// ```
pub fn display_timestamp(time: SystemTime) -> String {
    format_in(time, &Local, DISPLAY_FORMAT)
}

/// Compact local timestamp for file names, e.g. `20240301_123005`
///
/// # Examples
///
/// ```
/// use mw_core::filename_timestamp;
/// let text = filename_timestamp(std::time::SystemTime::now());
/// assert_eq!(text.len(), 15);
/// assert_eq!(&text[8..9], "_");
/// ```
pub fn filename_timestamp(time: SystemTime) -> String {
    format_in(time, &Local, FILENAME_FORMAT)
}

/// Measures how long a processing stage took
///
/// # Examples
///
/// ```
/// use mw_core::Stopwatch;
///
/// let stopwatch = Stopwatch::start();
/// assert!(stopwatch.elapsed().as_secs() < 1);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::thread;
    use std::time::UNIX_EPOCH;

    #[test]
    fn test_display_format_utc() {
        let time = UNIX_EPOCH + Duration::from_secs(1_609_459_200 + 3_723); // 2021-01-01 01:02:03
        assert_eq!(format_in(time, &Utc, DISPLAY_FORMAT), "2021-01-01 01:02:03");
    }

    #[test]
    fn test_filename_format_utc() {
        let time = UNIX_EPOCH + Duration::from_secs(1_609_459_200 + 3_723);
        assert_eq!(format_in(time, &Utc, FILENAME_FORMAT), "20210101_010203");
    }

    #[test]
    fn test_sub_second_precision_is_dropped() {
        let time = UNIX_EPOCH + Duration::from_millis(1_609_459_200_999);
        assert_eq!(format_in(time, &Utc, DISPLAY_FORMAT), "2021-01-01 00:00:00");
    }

    #[test]
    fn test_stopwatch_counts_up() {
        let stopwatch = Stopwatch::start();
        thread::sleep(Duration::from_millis(2));
        let first = stopwatch.elapsed();
        assert!(first >= Duration::from_millis(2));
        assert!(stopwatch.elapsed() >= first);
    }
}
