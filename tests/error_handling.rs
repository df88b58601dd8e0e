//! Error handling integration tests.
//!
//! These tests verify that meaningful errors are returned for various
//! failure conditions.

use std::path::Path;

use faceclip::{FaceClipError, VideoSource};

#[test]
fn open_nonexistent_file() {
    let result = VideoSource::open("this_file_does_not_exist.mp4");
    assert!(result.is_err());

    let error_message = result.unwrap_err().to_string();
    assert!(
        error_message.contains("Failed to open media file"),
        "Error message should mention file open failure: {error_message}",
    );
}

#[test]
fn open_invalid_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    match VideoSource::open(&invalid_file_path) {
        Err(FaceClipError::UnreadableMedia { path, .. }) => assert_eq!(path, invalid_file_path),
        other => panic!("expected UnreadableMedia, got {other:?}"),
    }
}

#[test]
fn frame_out_of_range() {
    let path = "tests/fixtures/sample_video.mp4";
    if !Path::new(path).exists() {
        return;
    }

    let mut source = VideoSource::open(path).expect("Failed to open test video");
    let total_frames = source.total_frames();
    let result = source.batch(&[0, total_frames + 10], None);

    match result {
        Err(FaceClipError::FrameOutOfRange {
            frame_number,
            total_frames: reported,
        }) => {
            assert_eq!(frame_number, total_frames + 10);
            assert_eq!(reported, total_frames);
        }
        other => panic!("expected FrameOutOfRange, got {:?}", other.map(|frames| frames.len())),
    }
}

#[test]
fn error_messages_carry_context() {
    let detection = FaceClipError::Detection {
        frame_index: 90,
        reason: "model crashed".to_string(),
    };
    assert_eq!(
        detection.to_string(),
        "Face detection failed on frame 90: model crashed"
    );

    let export = FaceClipError::ExportIo {
        path: "clips/a_0_700.mp4".into(),
        reason: "disk full".to_string(),
    };
    assert!(export.to_string().contains("clips/a_0_700.mp4"));
    assert!(export.to_string().contains("disk full"));
}

#[test]
fn io_errors_convert() {
    let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let error: FaceClipError = io_error.into();
    assert!(matches!(error, FaceClipError::IoError(_)));
}
