//! ABOUTME: Axis-aligned rectangles in frame coordinates
//! ABOUTME: Used for regions of interest and motion bounding boxes

use mw_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rectangle `(x, y, width, height)` in pixel coordinates
///
/// Coordinates are signed so that a configured region may start outside the
/// frame; every rectangle handed to the pipeline stages has been clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a whole `width` x `height` frame
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    /// True when the rectangle covers no pixels
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Exclusive right edge, saturating at `i32::MAX`
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge, saturating at `i32::MAX`
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// `(left, top, right, bottom)` without overflow
    fn edges(&self) -> (i64, i64, i64, i64) {
        let (x, y) = (self.x as i64, self.y as i64);
        (x, y, x + self.width as i64, y + self.height as i64)
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// Intersection of two rectangles; empty rectangles come back as `Rect::default()`
    pub fn intersect(&self, other: &Rect) -> Rect {
        let (left, top, right, bottom) = self.edges();
        let (other_left, other_top, other_right, other_bottom) = other.edges();

        let x = left.max(other_left);
        let y = top.max(other_top);
        let right = right.min(other_right);
        let bottom = bottom.min(other_bottom);

        if right <= x || bottom <= y {
            Rect::default()
        } else {
            // Each span is bounded by one input's width or height
            Rect::new(x as i32, y as i32, (right - x) as i32, (bottom - y) as i32)
        }
    }

    /// True when `other` lies entirely inside this rectangle
    pub fn contains_rect(&self, other: &Rect) -> bool {
        let (left, top, right, bottom) = self.edges();
        let (other_left, other_top, other_right, other_bottom) = other.edges();

        !other.is_empty()
            && other_left >= left
            && other_top >= top
            && other_right <= right
            && other_bottom <= bottom
    }

    /// True when the pixel `(px, py)` lies inside this rectangle
    pub fn contains_point(&self, px: i32, py: i32) -> bool {
        let (left, top, right, bottom) = self.edges();
        let (px, py) = (px as i64, py as i64);
        px >= left && py >= top && px < right && py < bottom
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

impl FromStr for Rect {
    type Err = Error;

    /// Parse `x,y,width,height`; width and height must be positive
    fn from_str(input: &str) -> Result<Self> {
        let values = input
            .split(',')
            .map(|token| token.trim().parse::<i32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| {
                Error::Config("Invalid ROI format. Expected x,y,width,height.".to_string())
            })?;

        let &[x, y, width, height] = values.as_slice() else {
            return Err(Error::Config(
                "Invalid ROI format. Expected x,y,width,height.".to_string(),
            ));
        };

        let rect = Rect::new(x, y, width, height);
        if rect.is_empty() {
            return Err(Error::Config(format!(
                "Invalid ROI {}: width and height must be positive",
                input
            )));
        }

        Ok(rect)
    }
}
