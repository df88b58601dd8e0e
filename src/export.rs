//! Clip export.
//!
//! [`ClipExporter`] re-decodes one [`ClipWindow`] of a [`VideoSource`] and
//! re-encodes it as a standalone video. Frames are streamed from decoder to
//! encoder one at a time, so memory does not grow with clip length.
//!
//! Clip files are named `{prefix}_{start_frame}_{end_frame}.{extension}`
//! using the window's *requested* end frame, even when the video ends
//! earlier and fewer frames are written.
//!
//! # Example
//!
//! ```no_run
//! use faceclip::{ClipEncoderOptions, ClipExporter, ClipWindow, VideoSource};
//!
//! let mut source = VideoSource::open("input.mp4")?;
//! let exporter = ClipExporter::new("clips", ClipEncoderOptions::default());
//! let written = exporter.export_clip(&mut source, ClipWindow::new(0, 700), "speaker")?;
//! println!("{written:?}"); // Some("clips/speaker_0_700.mp4")
//! # Ok::<(), faceclip::FaceClipError>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use ffmpeg_next::codec::Id;
use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::encoder::video::Encoder as VideoEncoder;
use ffmpeg_next::format::context::Output;
use ffmpeg_next::format::{Flags as FormatFlags, Pixel};
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};
use ffmpeg_next::{Dictionary, Packet, Rational};

use crate::error::FaceClipError;
use crate::segment::ClipWindow;
use crate::source::{DecodeFlow, VideoSource};

/// Supported clip codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// H.264 / AVC.
    H264,
    /// H.265 / HEVC.
    H265,
    /// MPEG-4 Part 2.
    Mpeg4,
}

impl VideoCodec {
    fn to_codec_id(self) -> Id {
        match self {
            VideoCodec::H264 => Id::H264,
            VideoCodec::H265 => Id::HEVC,
            VideoCodec::Mpeg4 => Id::MPEG4,
        }
    }
}

/// Encoder settings for exported clips.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipEncoderOptions {
    /// Codec to use. Default is H.264.
    pub codec: VideoCodec,
    /// Constant Rate Factor (0-51, lower is better). Default: 23.
    pub crf: Option<u32>,
    /// Bitrate in bits per second. If set, overrides CRF.
    pub bitrate: Option<usize>,
    /// Output frame rate. `None` uses the source's average frame rate.
    pub fps: Option<u32>,
    /// Container extension, which also selects the muxer. Default `mp4`.
    pub extension: String,
}

impl Default for ClipEncoderOptions {
    fn default() -> Self {
        Self {
            codec: VideoCodec::H264,
            crf: Some(23),
            bitrate: None,
            fps: None,
            extension: "mp4".to_string(),
        }
    }
}

impl ClipEncoderOptions {
    /// Set the codec.
    pub fn codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Set the CRF quality value.
    pub fn crf(mut self, crf: u32) -> Self {
        self.crf = Some(crf);
        self
    }

    /// Set the target bitrate in bits per second.
    pub fn bitrate(mut self, bitrate: usize) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    /// Force an output frame rate.
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = Some(fps);
        self
    }

    /// Set the container extension (without the dot).
    pub fn extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_ascii_lowercase();
        self
    }
}

/// Writes clip windows of a source video to disk.
#[derive(Debug, Clone)]
pub struct ClipExporter {
    output_directory: PathBuf,
    options: ClipEncoderOptions,
}

impl ClipExporter {
    /// Create an exporter writing into `output_directory`.
    ///
    /// The directory is created on the first export.
    pub fn new<P: AsRef<Path>>(output_directory: P, options: ClipEncoderOptions) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
            options,
        }
    }

    /// Destination for `window`: `{prefix}_{start}_{end}.{extension}`.
    pub fn clip_path(&self, prefix: &str, window: ClipWindow) -> PathBuf {
        self.output_directory.join(format!(
            "{prefix}_{}_{}.{}",
            window.start_frame, window.end_frame, self.options.extension
        ))
    }

    /// Export frames `[start, min(end, total_frames))` of `window`.
    ///
    /// Returns the written path, or `None` when nothing was written: the
    /// window starts at or past the last frame, or the decoder produced no
    /// frame inside it.
    ///
    /// # Errors
    ///
    /// - [`FaceClipError::ExportIo`] if the destination cannot be created
    ///   or written.
    /// - [`FaceClipError::VideoEncodeError`] if the encoder cannot be set up.
    /// - Decode errors from the source.
    ///
    /// A partially written file is removed before an error is returned.
    pub fn export_clip(
        &self,
        source: &mut VideoSource,
        window: ClipWindow,
        prefix: &str,
    ) -> Result<Option<PathBuf>, FaceClipError> {
        let total_frames = source.total_frames();
        if window.start_frame >= total_frames {
            log::debug!(
                "Window [{}, {}) starts past the last frame ({total_frames}); skipping",
                window.start_frame,
                window.end_frame,
            );
            return Ok(None);
        }

        let end_frame = window.clamped_end(total_frames);
        let path = self.clip_path(prefix, window);
        let fps = self.options.fps.unwrap_or(source.average_frame_rate());

        fs::create_dir_all(&self.output_directory).map_err(|error| FaceClipError::ExportIo {
            path: self.output_directory.clone(),
            reason: error.to_string(),
        })?;

        let mut writer: Option<ClipWriter> = None;
        let result = source.decode_from(window.start_frame, |frame_number, frame| {
            if frame_number >= end_frame {
                return Ok(DecodeFlow::Stop);
            }
            if writer.is_none() {
                writer = Some(ClipWriter::create(&path, frame, fps, &self.options)?);
            }
            if let Some(writer) = writer.as_mut() {
                writer.push(frame)?;
            }
            Ok(if frame_number + 1 >= end_frame {
                DecodeFlow::Stop
            } else {
                DecodeFlow::Continue
            })
        });

        let finished = result.and_then(|()| writer.map(ClipWriter::finish).transpose());
        match finished {
            Ok(Some(frames_written)) => {
                log::info!(
                    "Wrote {frames_written} frames [{}, {end_frame}) to {}",
                    window.start_frame,
                    path.display(),
                );
                Ok(Some(path))
            }
            Ok(None) => {
                log::warn!(
                    "No frames decoded in [{}, {end_frame}); {} not written",
                    window.start_frame,
                    path.display(),
                );
                Ok(None)
            }
            Err(error) => {
                let _ = fs::remove_file(&path);
                Err(error)
            }
        }
    }
}

/// An open output file with a configured encoder.
struct ClipWriter {
    output: Output,
    encoder: VideoEncoder,
    scaler: ScalingContext,
    stream_index: usize,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    frames_written: u64,
    path: PathBuf,
}

impl ClipWriter {
    /// Open `path` and set up an encoder sized after `first_frame`.
    fn create(
        path: &Path,
        first_frame: &VideoFrame,
        fps: u32,
        options: &ClipEncoderOptions,
    ) -> Result<Self, FaceClipError> {
        let write_error = |what: &str, error: ffmpeg_next::Error| FaceClipError::ExportIo {
            path: path.to_path_buf(),
            reason: format!("{what}: {error}"),
        };

        // 4:2:0 chroma subsampling needs even dimensions.
        let width = first_frame.width() & !1;
        let height = first_frame.height() & !1;
        let fps = fps.max(1) as i32;
        let encoder_time_base = Rational::new(1, fps);
        let target_pixel = Pixel::YUV420P;

        let mut output =
            ffmpeg_next::format::output(path).map_err(|e| write_error("cannot open output", e))?;
        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        let codec_id = options.codec.to_codec_id();
        let encoder_codec = ffmpeg_next::encoder::find(codec_id).ok_or_else(|| {
            FaceClipError::VideoEncodeError(format!("codec {codec_id:?} not available"))
        })?;

        let mut stream = output
            .add_stream(encoder_codec)
            .map_err(|e| write_error("cannot add stream", e))?;
        let stream_index = stream.index();

        let mut encoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.encoder().video())
            .map_err(|e| {
                FaceClipError::VideoEncodeError(format!("cannot create video encoder: {e}"))
            })?;

        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(target_pixel);
        encoder.set_time_base(encoder_time_base);
        encoder.set_frame_rate(Some(Rational::new(fps, 1)));
        if let Some(bitrate) = options.bitrate {
            encoder.set_bit_rate(bitrate);
        }
        if needs_global_header {
            unsafe {
                (*encoder.as_mut_ptr()).flags |=
                    ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }
        }

        let mut encoder_options = Dictionary::new();
        if let (Some(crf), None) = (options.crf, options.bitrate) {
            encoder_options.set("crf", &crf.to_string());
        }

        let encoder = encoder
            .open_as_with(encoder_codec, encoder_options)
            .map_err(|e| FaceClipError::VideoEncodeError(format!("cannot open encoder: {e}")))?;
        stream.set_parameters(&encoder);

        output
            .write_header()
            .map_err(|e| write_error("cannot write header", e))?;

        // The muxer may pick its own time base while writing the header.
        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| {
                FaceClipError::VideoEncodeError("output stream disappeared".to_string())
            })?;

        let scaler = ScalingContext::get(
            first_frame.format(),
            first_frame.width(),
            first_frame.height(),
            target_pixel,
            width,
            height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|e| FaceClipError::VideoEncodeError(format!("cannot create scaler: {e}")))?;

        log::debug!(
            "Opened clip {} ({width}x{height} @ {fps} fps, codec={:?})",
            path.display(),
            options.codec,
        );

        Ok(Self {
            output,
            encoder,
            scaler,
            stream_index,
            encoder_time_base,
            stream_time_base,
            frames_written: 0,
            path: path.to_path_buf(),
        })
    }

    /// Convert and encode one decoded frame.
    fn push(&mut self, frame: &VideoFrame) -> Result<(), FaceClipError> {
        let mut converted = VideoFrame::empty();
        self.scaler
            .run(frame, &mut converted)
            .map_err(|e| FaceClipError::VideoEncodeError(format!("scaling failed: {e}")))?;
        converted.set_pts(Some(self.frames_written as i64));
        self.frames_written += 1;

        self.encoder
            .send_frame(&converted)
            .map_err(|e| FaceClipError::VideoEncodeError(format!("send_frame failed: {e}")))?;
        self.drain()
    }

    /// Flush the encoder, write the trailer, and return the frame count.
    fn finish(mut self) -> Result<u64, FaceClipError> {
        self.encoder
            .send_eof()
            .map_err(|e| FaceClipError::VideoEncodeError(format!("send_eof failed: {e}")))?;
        self.drain()?;
        self.output
            .write_trailer()
            .map_err(|e| FaceClipError::ExportIo {
                path: self.path.clone(),
                reason: format!("cannot write trailer: {e}"),
            })?;
        Ok(self.frames_written)
    }

    fn drain(&mut self) -> Result<(), FaceClipError> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|e| FaceClipError::ExportIo {
                    path: self.path.clone(),
                    reason: format!("write packet failed: {e}"),
                })?;
        }
        Ok(())
    }
}
