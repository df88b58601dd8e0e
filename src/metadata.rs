//! Video metadata.
//!
//! [`VideoMetadata`] is read once when a [`VideoSource`](crate::VideoSource)
//! is opened and cached for its lifetime.

use std::time::Duration;

/// Metadata for the video stream of an opened source.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw frames per second (may be fractional, e.g. 29.97).
    pub frames_per_second: f64,
    /// Frame rate rounded up to an integer. All index math uses this value.
    pub average_frame_rate: u32,
    /// Total number of frames. Taken from the container when it reports one,
    /// otherwise estimated from duration and frame rate.
    pub frame_count: u64,
    /// Whether `frame_count` is an estimate rather than a container value.
    pub frame_count_estimated: bool,
    /// Container duration.
    pub duration: Duration,
    /// Codec name (e.g. `"h264"`, `"vp9"`).
    pub codec: String,
    /// Index of the video stream inside the container.
    pub stream_index: usize,
}

impl VideoMetadata {
    /// Number of whole sampled units the video spans at the given sample
    /// interval, i.e. `ceil(frame_count / frames_per_unit)`.
    pub fn unit_count(&self, sample_interval_seconds: u32) -> u64 {
        let frames_per_unit = self.average_frame_rate as u64 * sample_interval_seconds as u64;
        if frames_per_unit == 0 {
            return 0;
        }
        self.frame_count.div_ceil(frames_per_unit)
    }
}
