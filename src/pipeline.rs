//! End-to-end orchestration.
//!
//! [`ClipPipeline`] ties the stages together for each video: open the
//! source, count faces per unit, select windows, and export every window as
//! a clip. Failures are contained at the narrowest scope that makes sense:
//! a failed clip does not stop its siblings, and a failed video does not stop
//! the catalog.
//!
//! # Example
//!
//! ```no_run
//! use faceclip::{Catalog, ClipPipeline, CommandDetector, PipelineOptions};
//!
//! let detector = CommandDetector::spawn("python3", ["detect_faces.py"])?;
//! let pipeline = ClipPipeline::new(detector, PipelineOptions::new().with_output_directory("clips"))?;
//!
//! let catalog = Catalog::from_json_file("videos.json")?;
//! let report = pipeline.process_catalog(&catalog.entries);
//! println!("{} clips written", report.clips_written());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::{Path, PathBuf};

use crate::{
    catalog::CatalogEntry,
    configuration::PipelineOptions,
    counter::{FaceCountSequence, FaceCounter},
    detector::FaceDetector,
    error::FaceClipError,
    export::ClipExporter,
    metadata::VideoMetadata,
    progress::{OperationType, ProgressTracker},
    segment::{ClipWindow, select_windows},
    source::VideoSource,
};

/// Outcome of processing one video.
#[derive(Debug)]
pub struct VideoReport {
    /// Path of the source video.
    pub source: PathBuf,
    /// Prefix used for clip file names.
    pub prefix: String,
    /// Metadata of the source.
    pub metadata: VideoMetadata,
    /// Face count per sampled unit.
    pub face_counts: FaceCountSequence,
    /// Every window selected for export, in order.
    pub windows: Vec<ClipWindow>,
    /// Clip files written.
    pub written: Vec<PathBuf>,
    /// Windows that produced no file (past the end, or no decodable frame).
    pub skipped: Vec<ClipWindow>,
    /// Windows whose export failed, with the error.
    pub failed: Vec<(ClipWindow, FaceClipError)>,
}

/// Outcome of processing a list of catalog entries.
#[derive(Debug, Default)]
pub struct CatalogReport {
    /// Reports for videos that were processed.
    pub videos: Vec<VideoReport>,
    /// Entries whose file does not exist.
    pub missing: Vec<PathBuf>,
    /// Videos that failed before any clip was exported.
    pub failed: Vec<(PathBuf, FaceClipError)>,
}

impl CatalogReport {
    /// Total number of clip files written across all videos.
    pub fn clips_written(&self) -> usize {
        self.videos.iter().map(|video| video.written.len()).sum()
    }
}

/// Runs the whole pipeline with one detector for the whole session.
pub struct ClipPipeline<D> {
    options: PipelineOptions,
    counter: FaceCounter<D>,
    exporter: ClipExporter,
}

impl<D: FaceDetector> ClipPipeline<D> {
    /// Create a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`FaceClipError::InvalidConfiguration`] if `options` do not
    /// validate.
    pub fn new(detector: D, options: PipelineOptions) -> Result<Self, FaceClipError> {
        options.validate()?;
        let exporter = ClipExporter::new(&options.output_directory, options.encoder.clone());
        Ok(Self {
            options,
            counter: FaceCounter::new(detector),
            exporter,
        })
    }

    /// The options this pipeline runs with.
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Process one catalog entry, naming clips after
    /// [`CatalogEntry::clip_prefix`].
    ///
    /// # Errors
    ///
    /// Returns an error if the video cannot be opened or counted. Clip export
    /// errors are recorded in [`VideoReport::failed`] instead.
    pub fn process_video(&self, entry: &CatalogEntry) -> Result<VideoReport, FaceClipError> {
        self.process_path(&entry.path, &entry.clip_prefix())
    }

    /// Process a video file, naming clips `{prefix}_{start}_{end}`.
    ///
    /// # Errors
    ///
    /// See [`process_video`](ClipPipeline::process_video).
    pub fn process_path<P: AsRef<Path>>(
        &self,
        path: P,
        prefix: &str,
    ) -> Result<VideoReport, FaceClipError> {
        let mut source = VideoSource::open(path.as_ref())?;
        let face_counts = self.counter.count_video(&mut source, &self.options)?;
        let windows = select_windows(
            &face_counts.counts,
            face_counts.frames_per_unit,
            &self.options.segment,
        )?;

        log::info!(
            "{}: {} window(s) selected from {} units",
            path.as_ref().display(),
            windows.len(),
            face_counts.len(),
        );

        let mut tracker = ProgressTracker::new(
            self.options.progress.clone(),
            OperationType::ClipExport,
            Some(windows.len() as u64),
        );

        let mut written = Vec::new();
        let mut skipped = Vec::new();
        let mut failed = Vec::new();
        for &window in &windows {
            match self.exporter.export_clip(&mut source, window, prefix) {
                Ok(Some(clip)) => written.push(clip),
                Ok(None) => skipped.push(window),
                Err(error) => {
                    log::warn!(
                        "Clip [{}, {}) of {} failed: {error}",
                        window.start_frame,
                        window.end_frame,
                        path.as_ref().display(),
                    );
                    failed.push((window, error));
                }
            }
            tracker.advance(1, Some(window.start_frame));
        }

        Ok(VideoReport {
            source: path.as_ref().to_path_buf(),
            prefix: prefix.to_string(),
            metadata: source.metadata().clone(),
            face_counts,
            windows,
            written,
            skipped,
            failed,
        })
    }

    /// Process entries in order, skipping missing files and containing
    /// per-video failures.
    pub fn process_catalog(&self, entries: &[CatalogEntry]) -> CatalogReport {
        let mut report = CatalogReport::default();

        for entry in entries {
            if !entry.path.exists() {
                log::warn!(
                    "Skipping {}: {} does not exist",
                    entry.url,
                    entry.path.display()
                );
                report.missing.push(entry.path.clone());
                continue;
            }

            match self.process_video(entry) {
                Ok(video) => report.videos.push(video),
                Err(error) => {
                    log::warn!("Skipping {}: {error}", entry.path.display());
                    report.failed.push((entry.path.clone(), error));
                }
            }
        }

        log::info!(
            "Processed {} of {} video(s), {} clip(s) written",
            report.videos.len(),
            entries.len(),
            report.clips_written(),
        );
        report
    }
}
