//! ABOUTME: FFmpeg-backed frame source for video files and local cameras
//! ABOUTME: Probes stream dimensions with ffprobe and decodes raw RGB frames from a pipe

use metrics::counter;
use mw_core::{Error, Result};
use mw_vision::{image::RgbImage, Frame, FrameSource};
use serde::Deserialize;
use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};
use tracing::{debug, info, warn};

/// What ffmpeg should open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FfmpegInput {
    /// Local capture device by index
    Camera(u32),
    /// Video file on disk
    File(PathBuf),
}

impl FfmpegInput {
    /// Demuxer and input arguments, ending with `-i <input>`
    pub fn input_args(&self) -> Vec<String> {
        match self {
            FfmpegInput::File(path) => vec!["-i".to_string(), path.display().to_string()],
            FfmpegInput::Camera(index) => camera_input_args(*index),
        }
    }
}

#[cfg(target_os = "macos")]
fn camera_input_args(index: u32) -> Vec<String> {
    vec![
        "-f".to_string(),
        "avfoundation".to_string(),
        "-framerate".to_string(),
        "30".to_string(),
        "-i".to_string(),
        index.to_string(),
    ]
}

#[cfg(not(target_os = "macos"))]
fn camera_input_args(index: u32) -> Vec<String> {
    vec![
        "-f".to_string(),
        "v4l2".to_string(),
        "-i".to_string(),
        format!("/dev/video{}", index),
    ]
}

/// Arguments for reading the first video stream's dimensions as JSON
pub fn probe_args(input: &FfmpegInput) -> Vec<String> {
    let mut args: Vec<String> = [
        "-v",
        "error",
        "-select_streams",
        "v:0",
        "-show_entries",
        "stream=width,height",
        "-of",
        "json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.extend(input.input_args());
    args
}

/// Arguments for decoding to packed RGB24 on stdout
///
/// Files are decoded without applying rotation metadata so frames keep the
/// stored dimensions that ffprobe reports.
pub fn decode_args(input: &FfmpegInput) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-nostdin".to_string(),
    ];
    if let FfmpegInput::File(_) = input {
        args.push("-noautorotate".to_string());
    }
    args.extend(input.input_args());
    args.extend(
        ["-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"]
            .iter()
            .map(|s| s.to_string()),
    );
    args
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

/// Extract `(width, height)` from ffprobe's JSON output
pub fn parse_probe_output(output: &str) -> Result<(u32, u32)> {
    let probe: ProbeOutput = serde_json::from_str(output)
        .map_err(|e| Error::Source(format!("Failed to parse ffprobe output: {}", e)))?;

    let stream = probe
        .streams
        .first()
        .ok_or_else(|| Error::Source("No video stream found".to_string()))?;

    match (stream.width, stream.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => Ok((width, height)),
        _ => Err(Error::Source(
            "Video stream reports no dimensions".to_string(),
        )),
    }
}

/// Decodes frames from an ffmpeg child process
#[derive(Debug)]
pub struct FfmpegSource {
    input: FfmpegInput,
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    frames_read: u64,
}

impl FfmpegSource {
    /// Probe the input and start decoding
    pub fn open(input: FfmpegInput, ffmpeg: &str, ffprobe: &str) -> Result<Self> {
        if let FfmpegInput::File(path) = &input {
            if !path.is_file() {
                return Err(Error::Source(format!(
                    "Video file does not exist: {}",
                    path.display()
                )));
            }
        }

        let (width, height) = probe_dimensions(&input, ffprobe)?;

        let args = decode_args(&input);
        debug!(command = ffmpeg, args = ?args, "Starting ffmpeg decoder");
        let mut child = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Source(format!("Failed to start {}: {}", ffmpeg, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Source("ffmpeg stdout was not captured".to_string()))?;

        info!(input = ?input, width, height, "Opened ffmpeg frame source");

        Ok(Self {
            input,
            child,
            stdout,
            width,
            height,
            frames_read: 0,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

fn probe_dimensions(input: &FfmpegInput, ffprobe: &str) -> Result<(u32, u32)> {
    let output = Command::new(ffprobe)
        .args(probe_args(input))
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::Source(format!("Failed to run {}: {}", ffprobe, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Source(format!(
            "Cannot open {:?}: {}",
            input,
            stderr.trim()
        )));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

impl FrameSource for FfmpegSource {
    fn read_next(&mut self) -> Result<Option<Frame>> {
        let mut buffer = vec![0u8; self.frame_len()];
        match self.stdout.read_exact(&mut buffer) {
            Ok(()) => {}
            // A truncated trailing frame also ends the stream
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!(frames = self.frames_read, "ffmpeg stream ended");
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::Source(format!("Failed to read from ffmpeg: {}", e)));
            }
        }

        let image = RgbImage::from_raw(self.width, self.height, buffer)
            .ok_or_else(|| Error::Source("Decoded frame has the wrong size".to_string()))?;

        self.frames_read += 1;
        counter!("capture_frames_read_total").increment(1);
        Ok(Some(Frame::now(image)))
    }

    fn describe(&self) -> String {
        match &self.input {
            FfmpegInput::Camera(index) => format!("camera {} via ffmpeg", index),
            FfmpegInput::File(path) => format!("video {} via ffmpeg", path.display()),
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            if let Err(e) = self.child.kill() {
                warn!(error = %e, "Failed to stop ffmpeg");
            }
        }
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{"programs": [], "streams": [{"width": 1280, "height": 720}]}"#;
        assert_eq!(parse_probe_output(json).unwrap(), (1280, 720));
    }

    #[test]
    fn test_parse_probe_output_without_streams() {
        assert!(matches!(
            parse_probe_output(r#"{"streams": []}"#),
            Err(Error::Source(_))
        ));
        assert!(matches!(parse_probe_output("{}"), Err(Error::Source(_))));
        assert!(matches!(
            parse_probe_output(r#"{"streams": [{"width": 0, "height": 0}]}"#),
            Err(Error::Source(_))
        ));
        assert!(parse_probe_output("not json").is_err());
    }

    #[test]
    fn test_decode_args_for_file() {
        let args = decode_args(&FfmpegInput::File(PathBuf::from("clip.mp4")));
        let joined = args.join(" ");
        assert!(joined.contains("-i clip.mp4"));
        assert!(joined.ends_with("-f rawvideo -pix_fmt rgb24 pipe:1"));
        // Input options must precede the input
        let input_pos = args.iter().position(|a| a == "-i").unwrap();
        let format_pos = args.iter().rposition(|a| a == "-f").unwrap();
        assert!(input_pos < format_pos);
        // Rotation stays off so the raw frame size matches the probed size
        let rotate_pos = args.iter().position(|a| a == "-noautorotate").unwrap();
        assert!(rotate_pos < input_pos);
    }

    #[test]
    fn test_probe_args_select_first_video_stream() {
        let args = probe_args(&FfmpegInput::File(PathBuf::from("clip.mp4")));
        assert_eq!(&args[..4], ["-v", "error", "-select_streams", "v:0"]);
        assert_eq!(args.last().map(String::as_str), Some("clip.mp4"));
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_camera_args_use_v4l2_device() {
        let args = FfmpegInput::Camera(2).input_args();
        assert_eq!(args, ["-f", "v4l2", "-i", "/dev/video2"]);
    }

    #[test]
    fn test_missing_video_file_is_a_source_error() {
        let result = FfmpegSource::open(
            FfmpegInput::File(PathBuf::from("/nonexistent/clip.mp4")),
            "ffmpeg",
            "ffprobe",
        );
        assert!(matches!(result, Err(Error::Source(_))));
    }
}
