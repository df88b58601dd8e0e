//! Pipeline configuration.
//!
//! [`PipelineOptions`] gathers every tunable the pipeline uses and is passed
//! explicitly into each component when it is constructed. Nothing is read
//! from process-wide state.
//!
//! # Example
//!
//! ```
//! use faceclip::{FrameSize, PipelineOptions};
//!
//! let options = PipelineOptions::new()
//!     .with_batch_size(40)
//!     .with_min_run_units(5)
//!     .with_frame_size(Some(FrameSize::new(640, 360)));
//! assert!(options.validate().is_ok());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::FaceClipError;
use crate::export::ClipEncoderOptions;
use crate::progress::{NoOpProgress, ProgressCallback};
use crate::segment::SegmentOptions;

/// Fixed output dimensions for frames handed to the detector.
///
/// Frames are stretched to exactly this size; the source aspect ratio is not
/// preserved. Detector coordinates are only ever interpreted in this space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
}

impl FrameSize {
    /// Create a frame size. Zero dimensions are clamped to 1.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Scale a reference resolution by a factor, truncating like an integer
    /// cast (1920×1080 at 0.3 gives 576×324).
    pub fn scaled(width: u32, height: u32, factor: f64) -> Self {
        Self::new(
            (width as f64 * factor) as u32,
            (height as f64 * factor) as u32,
        )
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::scaled(1920, 1080, 0.3)
    }
}

/// Configuration for a processing session.
///
/// Defaults: one sample per second, batches of 80 sampled frames, detector
/// input at 576×324, single-face runs of at least 10 units, and clips of at
/// most 700 frames.
#[derive(Clone)]
pub struct PipelineOptions {
    /// Seconds of source video per sampled unit.
    pub sample_interval_seconds: u32,
    /// Maximum number of sampled frames decoded per round-trip.
    pub batch_size: usize,
    /// Detector input size. `None` keeps the source resolution.
    pub frame_size: Option<FrameSize>,
    /// Run selection and windowing parameters.
    pub segment: SegmentOptions,
    /// Clip encoder settings.
    pub encoder: ClipEncoderOptions,
    /// Directory clips are written into.
    pub output_directory: PathBuf,
    pub(crate) progress: Arc<dyn ProgressCallback>,
}

impl Debug for PipelineOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PipelineOptions")
            .field("sample_interval_seconds", &self.sample_interval_seconds)
            .field("batch_size", &self.batch_size)
            .field("frame_size", &self.frame_size)
            .field("segment", &self.segment)
            .field("encoder", &self.encoder)
            .field("output_directory", &self.output_directory)
            .finish_non_exhaustive()
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineOptions {
    /// Create options with the default values.
    pub fn new() -> Self {
        Self {
            sample_interval_seconds: 1,
            batch_size: 80,
            frame_size: Some(FrameSize::default()),
            segment: SegmentOptions::default(),
            encoder: ClipEncoderOptions::default(),
            output_directory: PathBuf::from("output"),
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Set how many seconds of video each sampled unit covers.
    #[must_use]
    pub fn with_sample_interval(mut self, seconds: u32) -> Self {
        self.sample_interval_seconds = seconds;
        self
    }

    /// Set the maximum number of frames decoded per batch.
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the detector input size. `None` disables resizing.
    #[must_use]
    pub fn with_frame_size(mut self, size: Option<FrameSize>) -> Self {
        self.frame_size = size;
        self
    }

    /// Set the face count a run must have to be exported.
    #[must_use]
    pub fn with_target_face_count(mut self, count: usize) -> Self {
        self.segment.target_face_count = count;
        self
    }

    /// Set the minimum run length, in sampled units.
    #[must_use]
    pub fn with_min_run_units(mut self, units: usize) -> Self {
        self.segment.min_run_units = units;
        self
    }

    /// Set the maximum clip length, in native frames.
    #[must_use]
    pub fn with_max_clip_frames(mut self, frames: u64) -> Self {
        self.segment.max_clip_frames = frames;
        self
    }

    /// Replace the whole segment configuration.
    #[must_use]
    pub fn with_segment_options(mut self, segment: SegmentOptions) -> Self {
        self.segment = segment;
        self
    }

    /// Replace the clip encoder configuration.
    #[must_use]
    pub fn with_encoder(mut self, encoder: ClipEncoderOptions) -> Self {
        self.encoder = encoder;
        self
    }

    /// Set the directory clips are written into.
    #[must_use]
    pub fn with_output_directory<P: AsRef<Path>>(mut self, directory: P) -> Self {
        self.output_directory = directory.as_ref().to_path_buf();
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Native frames covered by one sampled unit for a given frame rate.
    pub fn frames_per_unit(&self, average_frame_rate: u32) -> u64 {
        average_frame_rate as u64 * self.sample_interval_seconds as u64
    }

    /// Check that every value is inside its valid domain.
    ///
    /// # Errors
    ///
    /// Returns [`FaceClipError::InvalidConfiguration`] for a zero batch
    /// size, sample interval, or maximum clip length.
    pub fn validate(&self) -> Result<(), FaceClipError> {
        if self.batch_size == 0 {
            return Err(FaceClipError::InvalidConfiguration(
                "batch size must be greater than zero".to_string(),
            ));
        }
        if self.sample_interval_seconds == 0 {
            return Err(FaceClipError::InvalidConfiguration(
                "sample interval must be greater than zero".to_string(),
            ));
        }
        self.segment.validate()
    }
}
