//! ABOUTME: End-to-end smoke test for the motionwatch binary
//! ABOUTME: Runs the real executable over a PNG sequence and checks outputs and exit codes

use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;
use test_support::{gray_image, image_with_block, write_png_sequence};

fn motionwatch(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_motionwatch"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("motionwatch should start")
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[test]
fn test_image_sequence_run() {
    let root = TempDir::new().unwrap();
    let frames = root.path().join("frames");
    let mut images: Vec<_> = (0..10).map(|_| gray_image(160, 120)).collect();
    images.push(image_with_block(160, 120, (60, 40), (40, 40), 200));
    write_png_sequence(&frames, &images).unwrap();

    let snapshots = root.path().join("snapshots");
    let log = root.path().join("events.log");

    let output = motionwatch(&[
        "--images",
        &path_arg(&frames),
        "--save-snapshots",
        &path_arg(&snapshots),
        "--log",
        &path_arg(&log),
        "--summary-json",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["frames_read"], 11);
    assert_eq!(summary["motion_frames"], 1);
    assert_eq!(summary["snapshots_saved"], 1);
    assert_eq!(summary["stop_reason"], "end_of_stream");

    assert_eq!(std::fs::read_dir(&snapshots).unwrap().count(), 1);
    let events = std::fs::read_to_string(&log).unwrap();
    assert_eq!(events.lines().count(), 2);
}

#[test]
fn test_invalid_configuration_exits_with_error() {
    for args in [
        &["--images", "frames", "--resize", "1.5"][..],
        &["--images", "frames", "--bg", "gmg"][..],
        &["--images", "frames", "--roi", "0,0,-5,10"][..],
        &["--video", "a.mp4", "--images", "frames"][..],
    ] {
        let output = motionwatch(args);
        assert_eq!(output.status.code(), Some(1), "args: {:?}", args);
        assert!(output.stdout.is_empty());
    }
}

#[test]
fn test_unopenable_source_exits_with_error() {
    let output = motionwatch(&["--images", "/nonexistent/frames"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_unwritable_snapshot_directory_exits_with_error() {
    let root = TempDir::new().unwrap();
    let frames = root.path().join("frames");
    write_png_sequence(&frames, &[gray_image(32, 24)]).unwrap();
    let blocker = root.path().join("taken");
    std::fs::write(&blocker, "file").unwrap();

    let output = motionwatch(&[
        "--images",
        &path_arg(&frames),
        "--save-snapshots",
        &path_arg(&blocker.join("snapshots")),
    ]);
    assert_eq!(output.status.code(), Some(1));
}
