//! ABOUTME: Frame annotation for motion regions
//! ABOUTME: Draws two-pixel green rectangles around each detected region

use crate::{Rect, Region};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect as PixelRect;

/// Outline colour for motion regions
pub const REGION_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Outline thickness in pixels
pub const OUTLINE_THICKNESS: i32 = 2;

/// Copy of `image` with every region outlined
pub fn annotate_regions(image: &RgbImage, regions: &[Region]) -> RgbImage {
    let mut annotated = image.clone();
    for region in regions {
        draw_outline(&mut annotated, region.bounds, OUTLINE_THICKNESS, REGION_COLOR);
    }
    annotated
}

/// Draw a rectangle border of `thickness` pixels just inside `rect`, clipped to the image
pub fn draw_outline(image: &mut RgbImage, rect: Rect, thickness: i32, color: Rgb<u8>) {
    for inset in 0..thickness.max(0) {
        let (width, height) = (rect.width - 2 * inset, rect.height - 2 * inset);
        if width <= 0 || height <= 0 {
            break;
        }
        let layer =
            PixelRect::at(rect.x + inset, rect.y + inset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, layer, color);
    }
}
