//! ABOUTME: Connected foreground region extraction from binary masks
//! ABOUTME: Keeps outermost 8-connected components whose contour area reaches the minimum

use crate::{BinaryMask, MotionConfig, Rect};
use image::Luma;
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::contour_area;
use imageproc::region_labelling::{connected_components, Connectivity};
use mw_core::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A reported motion region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Minimal rectangle enclosing the component
    pub bounds: Rect,
    /// Area of the outer contour polygon through pixel centres
    pub area: f64,
    /// Foreground pixels in the component
    pub pixel_count: u32,
}

/// Outer border of one top-level component
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Outline {
    pub bounds: Rect,
    pub area: f64,
    /// Raster-first pixel of the component
    pub seed: (u32, u32),
}

impl Outline {
    /// Build from border points; `None` for an empty contour
    pub(crate) fn from_points(
        points: impl IntoIterator<Item = (i32, i32)>,
        area: f64,
    ) -> Option<Self> {
        let mut points = points.into_iter();
        let (x0, y0) = points.next()?;
        let (mut left, mut top, mut right, mut bottom) = (x0, y0, x0, y0);
        let mut seed = (x0, y0);

        for (x, y) in points {
            left = left.min(x);
            right = right.max(x);
            top = top.min(y);
            bottom = bottom.max(y);
            if (y, x) < (seed.1, seed.0) {
                seed = (x, y);
            }
        }

        Some(Self {
            bounds: Rect::new(left, top, right - left + 1, bottom - top + 1),
            area,
            seed: (seed.0.max(0) as u32, seed.1.max(0) as u32),
        })
    }
}

/// Turns a binary mask into motion regions
#[derive(Debug, Clone)]
pub struct RegionExtractor {
    min_area: f64,
    use_opencv: bool,
}

impl RegionExtractor {
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            min_area: config.min_area,
            use_opencv: config.backend.use_opencv,
        }
    }

    pub fn with_min_area(min_area: f64) -> Self {
        Self {
            min_area,
            use_opencv: false,
        }
    }

    pub fn min_area(&self) -> f64 {
        self.min_area
    }

    /// Regions in raster order of each component's first pixel
    pub fn extract(&self, mask: &BinaryMask) -> Result<Vec<Region>> {
        if mask.is_clear() {
            return Ok(Vec::new());
        }

        let mut outlines = self.outer_outlines(mask)?;
        let found = outlines.len();
        outlines.retain(|outline| outline.area >= self.min_area);
        outlines.sort_by_key(|outline| (outline.seed.1, outline.seed.0));

        let sizes = component_sizes(mask);
        let regions: Vec<Region> = outlines
            .into_iter()
            .map(|outline| Region {
                bounds: outline.bounds,
                area: outline.area,
                pixel_count: sizes(outline.seed),
            })
            .collect();

        debug!(
            components = found,
            regions = regions.len(),
            min_area = self.min_area,
            "Extracted motion regions"
        );
        Ok(regions)
    }

    #[cfg(feature = "heavy_opencv")]
    fn outer_outlines(&self, mask: &BinaryMask) -> Result<Vec<Outline>> {
        if self.use_opencv {
            return crate::cv_ops::outer_outlines(mask.as_image());
        }
        Ok(traced_outlines(mask))
    }

    #[cfg(not(feature = "heavy_opencv"))]
    fn outer_outlines(&self, mask: &BinaryMask) -> Result<Vec<Outline>> {
        if self.use_opencv {
            debug!("OpenCV contours need the heavy_opencv feature, tracing natively");
        }
        Ok(traced_outlines(mask))
    }
}

/// Outer borders without a parent; components sitting inside a hole are dropped
fn traced_outlines(mask: &BinaryMask) -> Vec<Outline> {
    find_contours::<i32>(mask.as_image())
        .into_iter()
        .filter(|contour| {
            matches!(contour.border_type, BorderType::Outer) && contour.parent.is_none()
        })
        .filter_map(|contour| {
            let area = contour_area(&contour.points).abs();
            Outline::from_points(contour.points.iter().map(|p| (p.x, p.y)), area)
        })
        .collect()
}

/// Pixel count lookup keyed by any pixel of an 8-connected component
fn component_sizes(mask: &BinaryMask) -> impl Fn((u32, u32)) -> u32 {
    let labels = connected_components(mask.as_image(), Connectivity::Eight, Luma([0u8]));

    let mut sizes: Vec<u32> = Vec::new();
    for label in labels.pixels().map(|p| p.0[0] as usize) {
        if label >= sizes.len() {
            sizes.resize(label + 1, 0);
        }
        sizes[label] += 1;
    }

    move |(x, y)| {
        labels
            .get_pixel_checked(x, y)
            .map(|p| p.0[0])
            .filter(|&label| label != 0)
            .and_then(|label| sizes.get(label as usize).copied())
            .unwrap_or(0)
    }
}
