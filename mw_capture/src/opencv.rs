//! ABOUTME: OpenCV capture source and interactive window renderer
//! ABOUTME: Compiled only with the heavy_opencv feature

use metrics::counter;
use mw_core::{Error, Result};
use mw_vision::image::{GrayImage, RgbImage};
use mw_vision::{Frame, FrameSource, RenderView, Renderer};
use opencv::{
    core::{self, Mat, Point, Scalar, CV_8UC1, CV_8UC3},
    highgui, imgproc,
    prelude::*,
    videoio,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Escape and `q` close the window
const EXIT_KEYS: [i32; 2] = [27, 113];

fn cv_error(context: &str, err: opencv::Error) -> Error {
    Error::External(format!("{}: {}", context, err))
}

#[derive(Debug, Clone)]
enum CaptureInput {
    Camera(u32),
    File(PathBuf),
}

/// Frames from `cv::VideoCapture`, converted from BGR to RGB
pub struct OpenCvSource {
    capture: videoio::VideoCapture,
    input: CaptureInput,
    bgr: Mat,
}

impl OpenCvSource {
    pub fn open_camera(index: u32) -> Result<Self> {
        let capture = videoio::VideoCapture::new(index as i32, videoio::CAP_ANY)
            .map_err(|e| cv_error("Failed to open camera", e))?;
        Self::from_capture(capture, CaptureInput::Camera(index))
    }

    pub fn open_file(path: &Path) -> Result<Self> {
        let name = path
            .to_str()
            .ok_or_else(|| Error::Source(format!("Path is not UTF-8: {}", path.display())))?;
        let capture = videoio::VideoCapture::from_file(name, videoio::CAP_ANY)
            .map_err(|e| cv_error("Failed to open video", e))?;
        Self::from_capture(capture, CaptureInput::File(path.to_path_buf()))
    }

    fn from_capture(capture: videoio::VideoCapture, input: CaptureInput) -> Result<Self> {
        let opened = capture
            .is_opened()
            .map_err(|e| cv_error("Failed to query capture", e))?;
        if !opened {
            return Err(Error::Source(format!("Failed to open input source: {:?}", input)));
        }
        info!(input = ?input, "Opened OpenCV frame source");
        Ok(Self {
            capture,
            input,
            bgr: Mat::default(),
        })
    }
}

impl FrameSource for OpenCvSource {
    fn read_next(&mut self) -> Result<Option<Frame>> {
        let grabbed = self
            .capture
            .read(&mut self.bgr)
            .map_err(|e| cv_error("Failed to read frame", e))?;
        if !grabbed || self.bgr.empty() {
            debug!("OpenCV capture ended");
            return Ok(None);
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color(
            &self.bgr,
            &mut rgb,
            imgproc::COLOR_BGR2RGB,
            0,
            core::AlgorithmHint::ALGO_HINT_DEFAULT,
        )
        .map_err(|e| cv_error("Failed to convert frame to RGB", e))?;

        let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
        let bytes = rgb
            .data_bytes()
            .map_err(|e| cv_error("Failed to access frame data", e))?
            .to_vec();
        let image = RgbImage::from_raw(width, height, bytes)
            .ok_or_else(|| Error::Source("Captured frame has the wrong size".to_string()))?;

        counter!("capture_frames_read_total").increment(1);
        Ok(Some(Frame::now(image)))
    }

    fn describe(&self) -> String {
        match &self.input {
            CaptureInput::Camera(index) => format!("camera {} via OpenCV", index),
            CaptureInput::File(path) => format!("video {} via OpenCV", path.display()),
        }
    }
}

/// Shows frames in a HighGUI window with timestamp and motion overlays
pub struct WindowRenderer {
    window: String,
    mask_window: String,
}

impl WindowRenderer {
    pub fn new(title: &str) -> Self {
        Self {
            window: title.to_string(),
            mask_window: format!("{} mask", title),
        }
    }

    fn rgb_to_bgr_mat(image: &RgbImage) -> Result<Mat> {
        let mut rgb = Mat::new_rows_cols_with_default(
            image.height() as i32,
            image.width() as i32,
            CV_8UC3,
            Scalar::all(0.0),
        )
        .map_err(|e| cv_error("Failed to allocate Mat", e))?;
        rgb.data_bytes_mut()
            .map_err(|e| cv_error("Failed to access Mat data", e))?
            .copy_from_slice(image.as_raw());

        let mut bgr = Mat::default();
        imgproc::cvt_color(
            &rgb,
            &mut bgr,
            imgproc::COLOR_RGB2BGR,
            0,
            core::AlgorithmHint::ALGO_HINT_DEFAULT,
        )
        .map_err(|e| cv_error("Failed to convert frame to BGR", e))?;
        Ok(bgr)
    }

    fn gray_mat(image: &GrayImage) -> Result<Mat> {
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

    fn overlay(frame: &mut Mat, text: &str, origin: Point, color: Scalar) -> Result<()> {
        imgproc::put_text(
            frame,
            text,
            origin,
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.6,
            color,
            2,
            imgproc::LINE_8,
            false,
        )
        .map_err(|e| cv_error("Failed to draw overlay text", e))
    }
}

impl Renderer for WindowRenderer {
    fn render(&mut self, view: &RenderView<'_>) -> Result<bool> {
        let mut frame = Self::rgb_to_bgr_mat(view.image)?;

        if let Some(timestamp) = view.timestamp {
            Self::overlay(
                &mut frame,
                timestamp,
                Point::new(10, frame.rows() - 10),
                Scalar::new(255.0, 255.0, 255.0, 0.0),
            )?;
        }
        if view.motion_detected {
            Self::overlay(
                &mut frame,
                "MOTION DETECTED",
                Point::new(10, 24),
                Scalar::new(0.0, 0.0, 255.0, 0.0),
            )?;
        }

        highgui::imshow(&self.window, &frame).map_err(|e| cv_error("Failed to show frame", e))?;
        if let Some(mask) = view.mask {
            let mask = Self::gray_mat(&mask.to_image())?;
            highgui::imshow(&self.mask_window, &mask)
                .map_err(|e| cv_error("Failed to show mask", e))?;
        }

        let key = highgui::wait_key(1).map_err(|e| cv_error("Failed to poll keyboard", e))?;
        Ok(EXIT_KEYS.contains(&key))
    }
}

impl Drop for WindowRenderer {
    fn drop(&mut self) {
        let _ = highgui::destroy_all_windows();
    }
}
