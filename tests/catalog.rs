//! Catalog parsing and catalog-level orchestration tests.

use std::path::{Path, PathBuf};

use faceclip::{
    Catalog, CatalogEntry, ClipPipeline, ClipWindow, DetectorFailure, FaceClipError, FaceDetector,
    FaceLandmarks, PipelineOptions, SegmentOptions,
};
use image::RgbImage;

struct NoFaces;

impl FaceDetector for NoFaces {
    fn detect(&self, _frame: &RgbImage) -> Result<Vec<FaceLandmarks>, DetectorFailure> {
        Ok(Vec::new())
    }
}

struct OneFace;

impl FaceDetector for OneFace {
    fn detect(&self, _frame: &RgbImage) -> Result<Vec<FaceLandmarks>, DetectorFailure> {
        Ok(vec![FaceLandmarks::default()])
    }
}

// ── Parsing ────────────────────────────────────────────────────────

#[test]
fn catalog_from_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let catalog_path = temporary_directory.path().join("videos.json");
    std::fs::write(
        &catalog_path,
        r#"{
            "https://www.youtube.com/watch?v=AAAAAAAAAAA": {
                "path": "downloads/first.mp4",
                "search_string": "talk shows"
            },
            "https://youtu.be/BBBBBBBBBBB": {
                "path": "downloads/second.mp4",
                "search_string": "podcasts"
            }
        }"#,
    )
    .expect("Failed to write catalog");

    let catalog = Catalog::from_json_file(&catalog_path).unwrap();
    assert_eq!(catalog.len(), 2);

    let first = &catalog.entries[0];
    assert_eq!(first.video_id(), Some("AAAAAAAAAAA"));
    assert_eq!(first.clip_prefix(), "talk shows_AAAAAAAAAAA");
    assert_eq!(first.path, PathBuf::from("downloads/first.mp4"));

    let second = &catalog.entries[1];
    assert_eq!(second.clip_prefix(), "podcasts_BBBBBBBBBBB");
}

#[test]
fn missing_catalog_file_is_io_error() {
    let result = Catalog::from_json_file("no_such_catalog.json");
    assert!(matches!(result, Err(FaceClipError::IoError(_))));
}

#[test]
fn malformed_catalog_is_catalog_error() {
    for document in ["", "[1, 2]", r#"{"u": "not an object"}"#, r#"{"u": {"path": 3}}"#] {
        let result = Catalog::from_json_str(document);
        assert!(
            matches!(result, Err(FaceClipError::CatalogError(_))),
            "{document:?} should be rejected, got {result:?}"
        );
    }
}

#[test]
fn empty_catalog_is_valid() {
    let catalog = Catalog::from_json_str("{}").unwrap();
    assert!(catalog.is_empty());
}

#[test]
fn video_id_requires_eleven_id_characters() {
    let too_short = CatalogEntry::new("https://youtu.be/abc", "x.mp4", "s");
    assert_eq!(too_short.video_id(), None);

    // The first candidate fails; a later one succeeds.
    let later = CatalogEntry::new("https://host/a!/watch?v=CCCCCCCCCCC", "x.mp4", "s");
    assert_eq!(later.video_id(), Some("CCCCCCCCCCC"));
}

// ── Orchestration ──────────────────────────────────────────────────

#[test]
fn missing_videos_are_skipped() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let options = PipelineOptions::new().with_output_directory(temporary_directory.path());
    let pipeline = ClipPipeline::new(NoFaces, options).unwrap();

    let entries = vec![
        CatalogEntry::new("https://youtu.be/DDDDDDDDDDD", "does/not/exist.mp4", "s"),
        CatalogEntry::new("https://youtu.be/EEEEEEEEEEE", "also/missing.mp4", "s"),
    ];
    let report = pipeline.process_catalog(&entries);

    assert!(report.videos.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(
        report.missing,
        vec![
            PathBuf::from("does/not/exist.mp4"),
            PathBuf::from("also/missing.mp4")
        ]
    );
    assert_eq!(report.clips_written(), 0);
}

#[test]
fn unreadable_video_does_not_stop_the_catalog() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let garbage = temporary_directory.path().join("garbage.mp4");
    std::fs::write(&garbage, b"this is not a media file").expect("Failed to write file");

    let options =
        PipelineOptions::new().with_output_directory(temporary_directory.path().join("clips"));
    let pipeline = ClipPipeline::new(NoFaces, options).unwrap();

    let entries = vec![
        CatalogEntry::new("https://youtu.be/FFFFFFFFFFF", &garbage, "s"),
        CatalogEntry::new("https://youtu.be/GGGGGGGGGGG", "missing.mp4", "s"),
    ];
    let report = pipeline.process_catalog(&entries);

    assert_eq!(report.failed.len(), 1);
    assert!(matches!(
        report.failed[0].1,
        FaceClipError::UnreadableMedia { .. }
    ));
    assert_eq!(report.missing.len(), 1);
    assert!(!temporary_directory.path().join("clips").exists());
}

#[test]
fn pipeline_rejects_invalid_options() {
    let options = PipelineOptions::new().with_max_clip_frames(0);
    let result = ClipPipeline::new(NoFaces, options);
    assert!(matches!(result, Err(FaceClipError::InvalidConfiguration(_))));
}

#[test]
fn failed_clip_does_not_stop_its_siblings() {
    let path = "tests/fixtures/sample_video.mp4";
    if !Path::new(path).exists() {
        return;
    }

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let segment = SegmentOptions::default()
        .min_run_units(2)
        .max_clip_frames(150)
        .flush_trailing_run(true);
    let options = PipelineOptions::new()
        .with_segment_options(segment)
        .with_output_directory(temporary_directory.path());
    let pipeline = ClipPipeline::new(OneFace, options).unwrap();

    // A directory squatting on the first clip's name makes that export fail.
    std::fs::create_dir(temporary_directory.path().join("sample_0_150.mp4"))
        .expect("Failed to create directory");

    let report = pipeline.process_path(path, "sample").unwrap();

    // 10 one-face units of 30 frames: frames [0, 300) in two windows.
    assert_eq!(
        report.windows,
        vec![ClipWindow::new(0, 150), ClipWindow::new(150, 300)]
    );
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, ClipWindow::new(0, 150));
    assert!(matches!(report.failed[0].1, FaceClipError::ExportIo { .. }));
    assert_eq!(
        report.written,
        vec![temporary_directory.path().join("sample_150_300.mp4")]
    );
    assert!(report.skipped.is_empty());
}
