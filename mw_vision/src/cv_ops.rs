//! ABOUTME: OpenCV versions of mask cleanup and outer contour extraction
//! ABOUTME: Compiled only with the heavy_opencv feature and selected by backend.use_opencv

use crate::regions::Outline;
use image::GrayImage;
use mw_core::{Error, Result};
use opencv::{
    core::{self, Mat, Point, Scalar, Size, Vector, CV_8UC1},
    imgproc,
    prelude::*,
};

pub(crate) fn cv_error(context: &str, err: opencv::Error) -> Error {
    Error::External(format!("{}: {}", context, err))
}

/// Copy a grayscale image into a new single-channel Mat
pub(crate) fn gray_to_mat(image: &GrayImage) -> Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        image.height() as i32,
        image.width() as i32,
        CV_8UC1,
        Scalar::all(0.0),
    )
    .map_err(|e| cv_error("Failed to allocate Mat", e))?;

    mat.data_bytes_mut()
        .map_err(|e| cv_error("Failed to access Mat data", e))?
        .copy_from_slice(image.as_raw());
    Ok(mat)
}

/// Copy a single-channel Mat back into a grayscale image
pub(crate) fn mat_to_gray(mat: &Mat, width: u32, height: u32) -> Result<GrayImage> {
    let data = mat
        .data_bytes()
        .map_err(|e| cv_error("Failed to read Mat data", e))?
        .to_vec();
    GrayImage::from_raw(width, height, data)
        .ok_or_else(|| Error::External("Mat has unexpected size".to_string()))
}

/// Binary threshold followed by 3x3 erosion and dilation passes
pub(crate) fn clean_mask(
    likelihood: &GrayImage,
    threshold: u8,
    erode_iterations: u32,
    dilate_iterations: u32,
) -> Result<GrayImage> {
    let input = gray_to_mat(likelihood)?;
    let mut mask = Mat::default();
    imgproc::threshold(
        &input,
        &mut mask,
        threshold as f64,
        255.0,
        imgproc::THRESH_BINARY,
    )
    .map_err(|e| cv_error("Failed to threshold foreground mask", e))?;

    let kernel =
        imgproc::get_structuring_element(imgproc::MORPH_RECT, Size::new(3, 3), Point::new(-1, -1))
            .map_err(|e| cv_error("Failed to create morphological kernel", e))?;
    let border = imgproc::morphology_default_border_value()
        .map_err(|e| cv_error("Failed to get morphology border value", e))?;

    if erode_iterations > 0 {
        let mut eroded = Mat::default();
        imgproc::erode(
            &mask,
            &mut eroded,
            &kernel,
            Point::new(-1, -1),
            erode_iterations as i32,
            core::BORDER_CONSTANT,
            border,
        )
        .map_err(|e| cv_error("Failed to erode foreground mask", e))?;
        mask = eroded;
    }

    if dilate_iterations > 0 {
        let mut dilated = Mat::default();
        imgproc::dilate(
            &mask,
            &mut dilated,
            &kernel,
            Point::new(-1, -1),
            dilate_iterations as i32,
            core::BORDER_CONSTANT,
            border,
        )
        .map_err(|e| cv_error("Failed to dilate foreground mask", e))?;
        mask = dilated;
    }

    mat_to_gray(&mask, likelihood.width(), likelihood.height())
}

/// Outermost contours of a 0/255 mask with their areas and bounding boxes
pub(crate) fn outer_outlines(mask: &GrayImage) -> Result<Vec<Outline>> {
    let input = gray_to_mat(mask)?;
    let mut contours: Vector<Vector<Point>> = Vector::new();
    imgproc::find_contours(
        &input,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_NONE,
        Point::new(0, 0),
    )
    .map_err(|e| cv_error("Failed to find contours", e))?;

    let mut outlines = Vec::with_capacity(contours.len());
    for contour in contours.iter() {
        let area = imgproc::contour_area(&contour, false)
            .map_err(|e| cv_error("Failed to measure contour area", e))?;
        let bounds = imgproc::bounding_rect(&contour)
            .map_err(|e| cv_error("Failed to compute bounding rectangle", e))?;

        if let Some(mut outline) = Outline::from_points(contour.iter().map(|p| (p.x, p.y)), area)
        {
            outline.bounds = crate::Rect::new(bounds.x, bounds.y, bounds.width, bounds.height);
            outlines.push(outline);
        }
    }
    Ok(outlines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::create_test_frame_with_motion;
    use crate::Rect;

    #[test]
    fn test_clean_mask_opens_noise() {
        let mut likelihood = create_test_frame_with_motion(40, 40, 10, 10, 6, 6, 255);
        likelihood.put_pixel(30, 30, image::Luma([255]));

        let cleaned = clean_mask(&likelihood, 100, 1, 2).unwrap();
        assert_eq!(cleaned.get_pixel(30, 30).0[0], 0);
        assert_eq!(cleaned.pixels().filter(|p| p.0[0] == 255).count(), 64);
    }

    #[test]
    fn test_outer_outlines_match_block() {
        let mut mask = create_test_frame_with_motion(50, 50, 10, 12, 20, 15, 255);
        for p in mask.pixels_mut() {
            if p.0[0] != 255 {
                p.0[0] = 0;
            }
        }

        let outlines = outer_outlines(&mask).unwrap();
        assert_eq!(outlines.len(), 1);
        assert_eq!(outlines[0].bounds, Rect::new(10, 12, 20, 15));
        assert_eq!(outlines[0].area, 19.0 * 14.0);
        assert_eq!(outlines[0].seed, (10, 12));
    }
}
