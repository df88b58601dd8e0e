//! Error types for the `faceclip` crate.
//!
//! [`FaceClipError`] is the single error type returned by every fallible
//! operation. Three variants carry the pipeline's failure granularity:
//!
//! - [`FaceClipError::UnreadableMedia`] aborts one video.
//! - [`FaceClipError::Detection`] aborts one video's face-count pass.
//! - [`FaceClipError::ExportIo`] aborts one clip and leaves its siblings alone.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `faceclip` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FaceClipError {
    /// The media file could not be opened or decoded.
    #[error("Failed to open media file at {path}: {reason}")]
    UnreadableMedia {
        /// Path that was passed to [`crate::VideoSource::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The face detector failed on a frame.
    #[error("Face detection failed on frame {frame_index}: {reason}")]
    Detection {
        /// Native frame index (or batch position when no index is known).
        frame_index: u64,
        /// Message reported by the detector.
        reason: String,
    },

    /// A clip destination could not be created or written.
    #[error("Failed to write clip {path}: {reason}")]
    ExportIo {
        /// Destination file.
        path: PathBuf,
        /// Underlying reason the write failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// The requested frame number exceeds the total frame count.
    #[error("Frame {frame_number} is out of range (video has {total_frames} frames)")]
    FrameOutOfRange {
        /// The frame number that was requested.
        frame_number: u64,
        /// The total number of frames in the video.
        total_frames: u64,
    },

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The clip encoder could not be set up or fed.
    #[error("Video encoding error: {0}")]
    VideoEncodeError(String),

    /// A configuration value is outside its valid domain.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The video catalog could not be parsed.
    #[error("Invalid catalog: {0}")]
    CatalogError(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl From<FfmpegError> for FaceClipError {
    fn from(error: FfmpegError) -> Self {
        FaceClipError::FfmpegError(error.to_string())
    }
}
