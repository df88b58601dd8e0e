//! # faceclip
//!
//! Segment videos by the number of faces on screen and export the
//! qualifying stretches as standalone clips.
//!
//! A video is sampled once per unit (one second by default). A
//! [`FaceDetector`] counts the faces in every sample, producing a
//! [`FaceCountSequence`]. Maximal runs whose face count matches a target and
//! that last long enough are cut into windows of at most 700 frames, and
//! each window is re-encoded to its own file through FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Run the Whole Pipeline
//!
//! ```no_run
//! use faceclip::{CatalogEntry, ClipPipeline, CommandDetector, PipelineOptions};
//!
//! let detector = CommandDetector::spawn("python3", ["detect_faces.py"])?;
//! let pipeline = ClipPipeline::new(detector, PipelineOptions::new())?;
//!
//! let entry = CatalogEntry::new(
//!     "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
//!     "downloads/interview.mp4",
//!     "interviews",
//! );
//! let report = pipeline.process_video(&entry)?;
//! for clip in &report.written {
//!     println!("{}", clip.display());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Select Windows From Known Counts
//!
//! Segmentation is pure and needs no video:
//!
//! ```
//! use faceclip::{SegmentOptions, select_windows};
//!
//! let counts = [0, 0, 1, 1, 1, 1, 2];
//! let options = SegmentOptions::default().min_run_units(3);
//! let windows = select_windows(&counts, 25, &options)?;
//! assert_eq!(windows.len(), 1);
//! assert_eq!(windows[0].start_frame, 50);
//! # Ok::<(), faceclip::FaceClipError>(())
//! ```
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | Runs the detector over each batch on rayon threads |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod catalog;
pub mod configuration;
mod conversion;
pub mod counter;
pub mod detector;
pub mod error;
pub mod export;
pub mod metadata;
pub mod pipeline;
pub mod progress;
pub mod segment;
pub mod source;

pub use catalog::{Catalog, CatalogEntry};
pub use configuration::{FrameSize, PipelineOptions};
pub use counter::{FaceCountSequence, FaceCounter, sample_indices};
pub use detector::{CommandDetector, DetectorFailure, FaceDetector, FaceLandmarks};
pub use error::FaceClipError;
pub use export::{ClipEncoderOptions, ClipExporter, VideoCodec};
pub use metadata::VideoMetadata;
pub use pipeline::{CatalogReport, ClipPipeline, VideoReport};
pub use progress::{OperationType, ProgressCallback, ProgressInfo};
pub use segment::{
    ClipWindow, Run, SegmentOptions, eligible_runs, runs, select_windows, split_into_windows,
};
pub use source::{FrameSource, VideoSource};
