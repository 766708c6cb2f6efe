//! ABOUTME: Shared testing utilities and helper functions
//! ABOUTME: Synthetic RGB frames and PNG sequences on disk

use image::{ImageResult, Rgb, RgbImage};
use std::path::{Path, PathBuf};

/// Background gray level of every synthetic frame
pub const BACKGROUND_LEVEL: u8 = 64;

/// Uniform gray RGB image
pub fn gray_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([BACKGROUND_LEVEL; 3]))
}

/// Gray RGB image with a solid block of `level` at `(x, y)`
pub fn image_with_block(
    width: u32,
    height: u32,
    (x, y): (u32, u32),
    (block_width, block_height): (u32, u32),
    level: u8,
) -> RgbImage {
    let mut image = gray_image(width, height);
    for py in y..(y + block_height).min(height) {
        for px in x..(x + block_width).min(width) {
            image.put_pixel(px, py, Rgb([level; 3]));
        }
    }
    image
}

/// Write images as `frame_0000.png`, `frame_0001.png`, ... and return their paths
pub fn write_png_sequence(dir: &Path, images: &[RgbImage]) -> ImageResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    images
        .iter()
        .enumerate()
        .map(|(i, image)| {
            let path = dir.join(format!("frame_{:04}.png", i));
            image.save(&path)?;
            Ok(path)
        })
        .collect()
}
