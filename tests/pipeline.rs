//! End-to-end captures through the public API, using sources that need no
//! hardware.

use std::fs;
use std::path::Path;

use framegrab::validation::validate_test_pattern;
use framegrab::{
    CaptureError, CaptureOrchestrator, CaptureSettings, CaptureState, Encoding, SourceRequest,
};
use image::{Rgb, RgbImage};

fn request(width: u32, height: u32) -> SourceRequest {
    SourceRequest {
        width,
        height,
        ..SourceRequest::default()
    }
}

fn settings(frames: u32) -> CaptureSettings {
    CaptureSettings {
        frames,
        ..CaptureSettings::default()
    }
}

fn descriptor(backend: &str, path: &Path) -> String {
    format!("{backend}:{}", path.to_str().expect("utf-8 temp path"))
}

#[test]
fn test_pattern_averages_to_exact_bars() {
    let mut orchestrator = CaptureOrchestrator::new(settings(3));
    let outcome = orchestrator
        .run("test", &request(8, 8))
        .expect("test source capture");

    assert_eq!(orchestrator.state(), CaptureState::Done);
    assert_eq!(outcome.frames, 3);
    assert!(outcome.dropped.is_empty());
    assert!(outcome.interrupted.is_none());
    assert_eq!(outcome.image.dimensions(), (8, 8));
    assert_eq!(outcome.image.get_pixel(0, 0), &Rgb([255, 255, 255]));
    assert_eq!(outcome.image.get_pixel(4, 3), &Rgb([255, 0, 255]));
    assert_eq!(outcome.image.get_pixel(7, 7), &Rgb([0, 0, 0]));
    validate_test_pattern(&outcome.image).expect("pattern survives averaging");
}

#[test]
fn test_skipped_frames_are_counted_but_not_averaged() {
    let mut orchestrator = CaptureOrchestrator::new(CaptureSettings {
        frames: 2,
        skip: 3,
        dump_frame: None,
    });
    let outcome = orchestrator
        .run("TEST:", &request(16, 4))
        .expect("test source capture");

    assert_eq!(outcome.frames, 2);
    assert_eq!(outcome.stats.grabs, 5);
    validate_test_pattern(&outcome.image).expect("pattern survives averaging");
}

#[test]
fn test_png_file_source() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("frame.png");
    let original = RgbImage::from_fn(6, 4, |x, y| {
        Rgb([
            u8::try_from(x * 40).expect("fits"),
            u8::try_from(y * 60).expect("fits"),
            128,
        ])
    });
    original.save(&path).expect("write png");

    let outcome = CaptureOrchestrator::new(settings(2))
        .run(path.to_str().expect("utf-8 temp path"), &request(320, 240))
        .expect("file source capture");

    assert_eq!(outcome.image.dimensions(), (6, 4));
    assert_eq!(outcome.image, original);
}

#[test]
fn test_raw_source_averages_frames() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("frames.rgb");
    let frame_size = Encoding::Rgb24.frame_size(4, 2).expect("fixed size");
    let mut bytes = vec![10u8; frame_size];
    bytes.extend(std::iter::repeat(30u8).take(frame_size));
    fs::write(&path, &bytes).expect("write raw frames");

    let raw_request = SourceRequest {
        encoding: Some(Encoding::Rgb24),
        ..request(4, 2)
    };
    let outcome = CaptureOrchestrator::new(settings(2))
        .run(&descriptor("raw", &path), &raw_request)
        .expect("raw source capture");

    assert_eq!(outcome.frames, 2);
    assert!(outcome.image.pixels().all(|p| *p == Rgb([20, 20, 20])));
}

#[test]
fn test_raw_source_end_of_stream_keeps_captured_frames() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("frames.grey");
    let frame_size = Encoding::Grey.frame_size(4, 4).expect("fixed size");
    fs::write(&path, vec![90u8; frame_size]).expect("write raw frame");

    let raw_request = SourceRequest {
        encoding: Some(Encoding::Grey),
        ..request(4, 4)
    };
    let mut orchestrator = CaptureOrchestrator::new(settings(5));
    let outcome = orchestrator
        .run(&descriptor("raw", &path), &raw_request)
        .expect("capture finalizes early");

    assert_eq!(orchestrator.state(), CaptureState::Done);
    assert_eq!(outcome.frames, 1);
    assert!(matches!(outcome.interrupted, Some(CaptureError::EndOfStream)));
    assert!(outcome.image.pixels().all(|p| *p == Rgb([90, 90, 90])));
}

#[test]
fn test_raw_source_requires_palette() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("frames.raw");
    fs::write(&path, [0u8; 16]).expect("write raw frame");

    let mut orchestrator = CaptureOrchestrator::new(settings(1));
    let result = orchestrator.run(&descriptor("raw", &path), &request(2, 2));

    assert!(matches!(result, Err(CaptureError::UnsupportedEncoding(_))));
    assert_eq!(orchestrator.state(), CaptureState::Failed);
}

#[test]
fn test_dump_frame_writes_first_raw_frame() {
    let dir = tempfile::tempdir().expect("temp dir");
    let dump = dir.path().join("dump.bin");

    CaptureOrchestrator::new(CaptureSettings {
        frames: 2,
        skip: 0,
        dump_frame: Some(dump.clone()),
    })
    .run("test:", &request(8, 2))
    .expect("test source capture");

    let bytes = fs::read(&dump).expect("dump written");
    assert_eq!(bytes.len(), 8 * 2 * 3);
    assert_eq!(bytes.get(..3), Some(&[255u8, 255, 255][..]));
}

#[test]
fn test_missing_source_fails() {
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("nothing-here");

    let mut orchestrator = CaptureOrchestrator::new(settings(1));
    let result = orchestrator.run(missing.to_str().expect("utf-8 temp path"), &request(8, 8));

    assert!(matches!(result, Err(CaptureError::SourceUnavailable(_))));
    assert_eq!(orchestrator.state(), CaptureState::Failed);
}
