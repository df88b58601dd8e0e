//! Frame source.
//!
//! [`VideoSource`] opens a video once, caches its [`VideoMetadata`], and
//! serves frames by explicit native index. Each decode call builds a fresh
//! decoder, seeks to the keyframe before the first wanted frame, and decodes
//! forward; the decoder is dropped when the call returns.
//!
//! # Example
//!
//! ```no_run
//! use faceclip::{FrameSize, VideoSource};
//!
//! let mut source = VideoSource::open("input.mp4")?;
//! let fps = source.average_frame_rate() as u64;
//! let frames = source.batch(&[0, fps, 2 * fps], Some(FrameSize::new(576, 324)))?;
//! assert_eq!(frames.len(), 3);
//! # Ok::<(), faceclip::FaceClipError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{
    codec::context::Context as CodecContext,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::RgbImage;

use crate::{
    configuration::FrameSize,
    conversion::{
        average_frame_rate, frame_number_to_seek_timestamp, frame_to_buffer, pts_to_frame_number,
        rational_to_fps,
    },
    error::FaceClipError,
    metadata::VideoMetadata,
};

/// Whether a frame handler wants more frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DecodeFlow {
    Continue,
    Stop,
}

/// Random-access supplier of decoded frames.
///
/// [`VideoSource`] is the production implementation; the counter only
/// depends on this trait.
pub trait FrameSource {
    /// Total number of frames.
    fn total_frames(&self) -> u64;

    /// Average frame rate, rounded up to an integer.
    fn average_frame_rate(&self) -> u32;

    /// Frames at `indices`, in request order, optionally resized.
    ///
    /// # Errors
    ///
    /// Fails with [`FaceClipError::FrameOutOfRange`] if any index is ≥
    /// [`total_frames`](FrameSource::total_frames).
    fn batch(
        &mut self,
        indices: &[u64],
        resize: Option<FrameSize>,
    ) -> Result<Vec<RgbImage>, FaceClipError>;
}

/// An opened, decodable video.
///
/// Owned by whichever component opened it; dropping it releases the
/// demuxer.
pub struct VideoSource {
    input_context: Input,
    metadata: VideoMetadata,
    /// Stream start time in stream time base, subtracted before PTS → index.
    start_pts: i64,
    path: PathBuf,
}

impl Debug for VideoSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoSource")
            .field("metadata", &self.metadata)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl VideoSource {
    /// Open a video for frame retrieval.
    ///
    /// # Errors
    ///
    /// Returns [`FaceClipError::UnreadableMedia`] if the file cannot be
    /// opened, has no video stream, or reports no usable frame rate.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FaceClipError> {
        let path = path.as_ref().to_path_buf();
        let unreadable = |reason: String| FaceClipError::UnreadableMedia {
            path: path.clone(),
            reason,
        };

        log::debug!("Opening video: {}", path.display());

        ffmpeg_next::init()
            .map_err(|error| unreadable(format!("FFmpeg initialisation failed: {error}")))?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| unreadable(error.to_string()))?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or_else(|| unreadable("no video stream".to_string()))?;
        let stream_index = stream.index();
        let time_base = stream.time_base();

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| unreadable(format!("cannot create video decoder: {error}")))?;

        let frames_per_second = rational_to_fps(stream.avg_frame_rate())
            .or_else(|| rational_to_fps(stream.rate()))
            .ok_or_else(|| unreadable("stream reports no frame rate".to_string()))?;

        let duration = if stream.duration() > 0 {
            Duration::from_secs_f64(crate::conversion::pts_to_seconds(
                stream.duration(),
                time_base,
            ))
        } else if input_context.duration() > 0 {
            Duration::from_micros(input_context.duration() as u64)
        } else {
            Duration::ZERO
        };

        let (frame_count, frame_count_estimated) = if stream.frames() > 0 {
            (stream.frames() as u64, false)
        } else {
            ((duration.as_secs_f64() * frames_per_second) as u64, true)
        };

        // AV_NOPTS_VALUE is i64::MIN.
        let start_pts = match stream.start_time() {
            i64::MIN => 0,
            pts => pts,
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            average_frame_rate: average_frame_rate(frames_per_second),
            frame_count,
            frame_count_estimated,
            duration,
            codec,
            stream_index,
        };

        log::info!(
            "Opened video: {} ({}x{}, {:.3} fps → {}, {} frames{}, codec={})",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.frames_per_second,
            metadata.average_frame_rate,
            metadata.frame_count,
            if frame_count_estimated { " est." } else { "" },
            metadata.codec,
        );

        Ok(Self {
            input_context,
            metadata,
            start_pts,
            path,
        })
    }

    /// Cached metadata for the video stream.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Total number of frames.
    pub fn total_frames(&self) -> u64 {
        self.metadata.frame_count
    }

    /// Average frame rate, rounded up to an integer.
    pub fn average_frame_rate(&self) -> u32 {
        self.metadata.average_frame_rate
    }

    /// Path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the frames at `indices` and return them in request order.
    ///
    /// When `resize` is set every frame is stretched to exactly that size
    /// inside the FFmpeg scaler; otherwise frames keep the source
    /// resolution. Duplicate indices yield duplicate frames.
    ///
    /// # Errors
    ///
    /// - [`FaceClipError::FrameOutOfRange`] if any index is ≥
    ///   [`total_frames`](VideoSource::total_frames). Nothing is decoded.
    /// - [`FaceClipError::VideoDecodeError`] if the stream ends before every
    ///   requested index has been reached (possible when the frame count is
    ///   an estimate).
    pub fn batch(
        &mut self,
        indices: &[u64],
        resize: Option<FrameSize>,
    ) -> Result<Vec<RgbImage>, FaceClipError> {
        let total_frames = self.metadata.frame_count;
        if let Some(&frame_number) = indices.iter().find(|&&index| index >= total_frames) {
            return Err(FaceClipError::FrameOutOfRange {
                frame_number,
                total_frames,
            });
        }
        if indices.is_empty() {
            return Ok(Vec::new());
        }

        let mut targets = indices.to_vec();
        targets.sort_unstable();
        targets.dedup();

        let (width, height) = match resize {
            Some(size) => (size.width, size.height),
            None => (self.metadata.width, self.metadata.height),
        };

        log::debug!(
            "Decoding batch of {} frames [{}..={}] at {width}x{height}",
            targets.len(),
            targets[0],
            targets[targets.len() - 1],
        );

        let mut decoded: Vec<RgbImage> = Vec::with_capacity(targets.len());
        let mut scaler: Option<ScalingContext> = None;
        let mut rgb_frame = VideoFrame::empty();

        self.decode_from(targets[0], |frame_number, frame| {
            if decoded.len() < targets.len() && targets[decoded.len()] <= frame_number {
                if scaler.is_none() {
                    scaler = Some(ScalingContext::get(
                        frame.format(),
                        frame.width(),
                        frame.height(),
                        Pixel::RGB24,
                        width,
                        height,
                        ScalingFlags::BILINEAR,
                    )?);
                }
                if let Some(scaler) = scaler.as_mut() {
                    scaler.run(frame, &mut rgb_frame)?;
                }
                let image = rgb_frame_to_image(&rgb_frame, width, height)?;

                // A decoded frame past several targets (PTS gap) stands in
                // for all of them.
                while decoded.len() + 1 < targets.len() && targets[decoded.len() + 1] <= frame_number
                {
                    decoded.push(image.clone());
                }
                decoded.push(image);
            }

            Ok(if decoded.len() == targets.len() {
                DecodeFlow::Stop
            } else {
                DecodeFlow::Continue
            })
        })?;

        if decoded.len() < targets.len() {
            return Err(FaceClipError::VideoDecodeError(format!(
                "stream ended before frame {} (video reports {total_frames} frames)",
                targets[decoded.len()]
            )));
        }

        let ascending = indices.windows(2).all(|pair| pair[0] < pair[1]);
        if ascending {
            return Ok(decoded);
        }

        Ok(indices
            .iter()
            .map(|index| {
                // Every index is present: `targets` was built from `indices`.
                let position = targets.binary_search(index).unwrap_or_default();
                decoded[position].clone()
            })
            .collect())
    }

    /// Decode forward from the keyframe before `start_frame`, handing every
    /// frame at or after `start_frame` to `handler` with its native index.
    ///
    /// Stops when the handler returns [`DecodeFlow::Stop`] or the stream is
    /// exhausted (after flushing the decoder).
    pub(crate) fn decode_from<F>(
        &mut self,
        start_frame: u64,
        mut handler: F,
    ) -> Result<(), FaceClipError>
    where
        F: FnMut(u64, &VideoFrame) -> Result<DecodeFlow, FaceClipError>,
    {
        let stream_index = self.metadata.stream_index;
        let frames_per_second = self.metadata.frames_per_second;
        let start_pts = self.start_pts;

        let stream = self
            .input_context
            .stream(stream_index)
            .ok_or(FaceClipError::NoVideoStream)?;
        let time_base = stream.time_base();
        let decoder_context = CodecContext::from_parameters(stream.parameters())?;
        let mut decoder = decoder_context.decoder().video()?;

        let seek_timestamp = frame_number_to_seek_timestamp(start_frame, frames_per_second);
        self.input_context
            .seek(seek_timestamp, ..seek_timestamp)
            .map_err(|error| {
                FaceClipError::VideoDecodeError(format!(
                    "seek to frame {start_frame} failed: {error}"
                ))
            })?;

        let mut decoded_frame = VideoFrame::empty();
        let frame_number_of = |frame: &VideoFrame| {
            let pts = frame.timestamp().or_else(|| frame.pts()).unwrap_or(start_pts);
            pts_to_frame_number(pts - start_pts, time_base, frames_per_second)
        };

        for (stream, packet) in self.input_context.packets() {
            if stream.index() != stream_index {
                continue;
            }

            decoder.send_packet(&packet)?;

            while decoder.receive_frame(&mut decoded_frame).is_ok() {
                let frame_number = frame_number_of(&decoded_frame);
                if frame_number < start_frame {
                    continue;
                }
                if handler(frame_number, &decoded_frame)? == DecodeFlow::Stop {
                    return Ok(());
                }
            }
        }

        decoder.send_eof()?;
        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            let frame_number = frame_number_of(&decoded_frame);
            if frame_number < start_frame {
                continue;
            }
            if handler(frame_number, &decoded_frame)? == DecodeFlow::Stop {
                break;
            }
        }

        Ok(())
    }
}

impl FrameSource for VideoSource {
    fn total_frames(&self) -> u64 {
        VideoSource::total_frames(self)
    }

    fn average_frame_rate(&self) -> u32 {
        VideoSource::average_frame_rate(self)
    }

    fn batch(
        &mut self,
        indices: &[u64],
        resize: Option<FrameSize>,
    ) -> Result<Vec<RgbImage>, FaceClipError> {
        VideoSource::batch(self, indices, resize)
    }
}

/// Convert a scaled RGB24 frame to an [`RgbImage`].
fn rgb_frame_to_image(
    rgb_frame: &VideoFrame,
    width: u32,
    height: u32,
) -> Result<RgbImage, FaceClipError> {
    let buffer = frame_to_buffer(rgb_frame, width, height, 3);
    RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
        FaceClipError::VideoDecodeError(
            "Failed to construct RGB image from decoded frame data".to_string(),
        )
    })
}
