//! PipelineOptions, SegmentOptions, and ClipEncoderOptions tests.

use std::path::PathBuf;
use std::sync::Arc;

use faceclip::{
    ClipEncoderOptions, ClipExporter, ClipWindow, FaceClipError, FrameSize, PipelineOptions,
    ProgressCallback, ProgressInfo, SegmentOptions, VideoCodec,
};

// ── PipelineOptions ────────────────────────────────────────────────

#[test]
fn defaults() {
    let options = PipelineOptions::new();
    assert_eq!(options.sample_interval_seconds, 1);
    assert_eq!(options.batch_size, 80);
    assert_eq!(options.frame_size, Some(FrameSize::new(576, 324)));
    assert_eq!(options.segment.target_face_count, 1);
    assert_eq!(options.segment.min_run_units, 10);
    assert_eq!(options.segment.max_clip_frames, 700);
    assert!(!options.segment.flush_trailing_run);
    assert!(!options.segment.clamp_window_end);
    assert_eq!(options.output_directory, PathBuf::from("output"));
    assert!(options.validate().is_ok());
}

#[test]
fn builder_setters_apply() {
    let options = PipelineOptions::new()
        .with_sample_interval(2)
        .with_batch_size(16)
        .with_frame_size(None)
        .with_target_face_count(2)
        .with_min_run_units(4)
        .with_max_clip_frames(300)
        .with_output_directory("clips");

    assert_eq!(options.sample_interval_seconds, 2);
    assert_eq!(options.batch_size, 16);
    assert_eq!(options.frame_size, None);
    assert_eq!(options.segment.target_face_count, 2);
    assert_eq!(options.segment.min_run_units, 4);
    assert_eq!(options.segment.max_clip_frames, 300);
    assert_eq!(options.output_directory, PathBuf::from("clips"));
}

#[test]
fn segment_options_replace_whole_block() {
    let segment = SegmentOptions::default()
        .flush_trailing_run(true)
        .clamp_window_end(true);
    let options = PipelineOptions::new().with_segment_options(segment);
    assert_eq!(options.segment, segment);
}

#[test]
fn frames_per_unit_scales_with_interval() {
    assert_eq!(PipelineOptions::new().frames_per_unit(30), 30);
    assert_eq!(PipelineOptions::new().with_sample_interval(3).frames_per_unit(25), 75);
}

#[test]
fn validation_rejects_zero_values() {
    for options in [
        PipelineOptions::new().with_batch_size(0),
        PipelineOptions::new().with_sample_interval(0),
        PipelineOptions::new().with_max_clip_frames(0),
    ] {
        assert!(matches!(
            options.validate(),
            Err(FaceClipError::InvalidConfiguration(_))
        ));
    }
}

#[test]
fn debug_output_hides_callback() {
    struct Silent;
    impl ProgressCallback for Silent {
        fn on_progress(&self, _info: &ProgressInfo) {}
    }

    let options = PipelineOptions::new().with_progress(Arc::new(Silent));
    let debug = format!("{options:?}");
    assert!(debug.contains("PipelineOptions"));
    assert!(debug.contains("batch_size: 80"));
    assert!(debug.ends_with(".. }"));
}

// ── FrameSize ──────────────────────────────────────────────────────

#[test]
fn frame_size_scaling_truncates() {
    assert_eq!(FrameSize::default(), FrameSize::new(576, 324));
    assert_eq!(FrameSize::scaled(1280, 720, 0.5), FrameSize::new(640, 360));
    assert_eq!(FrameSize::scaled(101, 51, 0.5), FrameSize::new(50, 25));
}

#[test]
fn frame_size_never_zero() {
    assert_eq!(FrameSize::new(0, 0), FrameSize::new(1, 1));
    assert_eq!(FrameSize::scaled(10, 10, 0.01), FrameSize::new(1, 1));
}

// ── ClipEncoderOptions ─────────────────────────────────────────────

#[test]
fn encoder_defaults() {
    let options = ClipEncoderOptions::default();
    assert_eq!(options.codec, VideoCodec::H264);
    assert_eq!(options.crf, Some(23));
    assert_eq!(options.bitrate, None);
    assert_eq!(options.fps, None);
    assert_eq!(options.extension, "mp4");
}

#[test]
fn encoder_extension_is_normalized() {
    let options = ClipEncoderOptions::default()
        .codec(VideoCodec::Mpeg4)
        .bitrate(2_000_000)
        .extension(".MKV");
    assert_eq!(options.extension, "mkv");
    assert_eq!(options.bitrate, Some(2_000_000));
}

#[test]
fn clip_names_use_requested_window() {
    let exporter = ClipExporter::new("clips", ClipEncoderOptions::default());
    assert_eq!(
        exporter.clip_path("news_dQw4w9WgXcQ", ClipWindow::new(700, 1400)),
        PathBuf::from("clips/news_dQw4w9WgXcQ_700_1400.mp4")
    );

    let exporter = ClipExporter::new("out", ClipEncoderOptions::default().extension("mkv"));
    assert_eq!(
        exporter.clip_path("p", ClipWindow::new(0, 700)),
        PathBuf::from("out/p_0_700.mkv")
    );
}
