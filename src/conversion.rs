//! Internal index and timestamp conversions.
//!
//! The pipeline works in three spaces: sampled units, native frame indices,
//! and FFmpeg timestamps. All the arithmetic that moves between them lives
//! here.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy the first plane of a packed video frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × bpp).
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Convert a rational frame rate to frames per second.
///
/// Returns `None` for a zero numerator or denominator.
pub(crate) fn rational_to_fps(rate: Rational) -> Option<f64> {
    if rate.numerator() <= 0 || rate.denominator() <= 0 {
        return None;
    }
    Some(rate.numerator() as f64 / rate.denominator() as f64)
}

/// Round a raw frame rate up to the integer rate used for index math.
///
/// 29.97 becomes 30, 23.976 becomes 24, 25.0 stays 25.
pub(crate) fn average_frame_rate(frames_per_second: f64) -> u32 {
    if frames_per_second <= 0.0 {
        return 0;
    }
    frames_per_second.ceil() as u32
}

/// Rescale a PTS value from stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Rescale a PTS value to a native frame index.
///
/// Rounds to the nearest frame so that timestamps landing a hair before a
/// frame boundary map onto that frame.
pub(crate) fn pts_to_frame_number(pts: i64, time_base: Rational, frames_per_second: f64) -> u64 {
    let frame = pts_to_seconds(pts, time_base) * frames_per_second;
    if frame <= 0.0 { 0 } else { frame.round() as u64 }
}

/// Convert a frame index to a seek timestamp in AV_TIME_BASE (microseconds).
///
/// `Input::seek` with no stream selected expects container-level time.
pub(crate) fn frame_number_to_seek_timestamp(frame_number: u64, frames_per_second: f64) -> i64 {
    if frames_per_second <= 0.0 {
        return 0;
    }
    let seconds = frame_number as f64 / frames_per_second;
    (seconds * 1_000_000.0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_frame_rate_rounds_up() {
        assert_eq!(average_frame_rate(29.97), 30);
        assert_eq!(average_frame_rate(23.976), 24);
        assert_eq!(average_frame_rate(25.0), 25);
        assert_eq!(average_frame_rate(0.0), 0);
    }

    #[test]
    fn rational_rates() {
        assert_eq!(rational_to_fps(Rational::new(30000, 1001)).map(average_frame_rate), Some(30));
        assert_eq!(rational_to_fps(Rational::new(0, 1)), None);
        assert_eq!(rational_to_fps(Rational::new(25, 0)), None);
    }

    #[test]
    fn pts_maps_to_nearest_frame() {
        let time_base = Rational::new(1, 90_000);
        assert_eq!(pts_to_frame_number(0, time_base, 30.0), 0);
        assert_eq!(pts_to_frame_number(3_000, time_base, 30.0), 1);
        assert_eq!(pts_to_frame_number(2_999, time_base, 30.0), 1);
        assert_eq!(pts_to_frame_number(-3_000, time_base, 30.0), 0);
    }

    #[test]
    fn seek_timestamps_are_microseconds() {
        assert_eq!(frame_number_to_seek_timestamp(30, 30.0), 1_000_000);
        assert_eq!(frame_number_to_seek_timestamp(45, 30.0), 1_500_000);
        assert_eq!(frame_number_to_seek_timestamp(10, 0.0), 0);
    }
}
