//! ABOUTME: Core errors, time formatting, and tracing utilities
//! ABOUTME: Foundation crate used by all other motionwatch components

pub mod error;
pub mod telemetry;
pub mod time;

pub use error::{Error, Result};
pub use telemetry::{init_tracing, LogFormat};
pub use time::{display_timestamp, filename_timestamp, Stopwatch};
