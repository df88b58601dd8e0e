//! Per-unit face counting.
//!
//! [`FaceCounter`] owns a [`FaceDetector`] for the whole processing session
//! and turns a video into a [`FaceCountSequence`]: one face count per
//! sampled unit (one second of video by default).
//!
//! Sampled frames are decoded in batches of at most
//! [`PipelineOptions::batch_size`] so memory stays bounded regardless of
//! video length.

use image::RgbImage;

use crate::{
    configuration::PipelineOptions,
    detector::FaceDetector,
    error::FaceClipError,
    progress::{OperationType, ProgressTracker},
    source::FrameSource,
};

/// Face counts for one video, one entry per sampled unit.
///
/// Entry `i` describes native frame `i * frames_per_unit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceCountSequence {
    /// Face count per unit, in unit order.
    pub counts: Vec<usize>,
    /// Native frames spanned by one unit.
    pub frames_per_unit: u64,
}

impl FaceCountSequence {
    /// Number of sampled units.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns `true` if no unit was sampled.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Native frame indices to sample: `0, step, 2*step, …` strictly below
/// `total_frames - step`.
///
/// The last partial unit is dropped, so a video no longer than one unit
/// yields nothing.
///
/// # Errors
///
/// Returns [`FaceClipError::InvalidConfiguration`] if `frames_per_unit` is 0.
///
/// # Example
///
/// ```
/// let indices = faceclip::sample_indices(100, 30)?;
/// assert_eq!(indices, vec![0, 30, 60]);
/// # Ok::<(), faceclip::FaceClipError>(())
/// ```
pub fn sample_indices(total_frames: u64, frames_per_unit: u64) -> Result<Vec<u64>, FaceClipError> {
    if frames_per_unit == 0 {
        return Err(FaceClipError::InvalidConfiguration(
            "frames per unit must be greater than zero".to_string(),
        ));
    }
    let limit = total_frames.saturating_sub(frames_per_unit);
    Ok((0..limit).step_by(frames_per_unit as usize).collect())
}

/// Runs a detector over frames and reports face counts.
pub struct FaceCounter<D> {
    detector: D,
}

impl<D: FaceDetector> FaceCounter<D> {
    /// Take ownership of `detector` for the lifetime of the counter.
    pub fn new(detector: D) -> Self {
        Self { detector }
    }

    /// Borrow the owned detector.
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Count faces in each frame, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`FaceClipError::Detection`] for the first frame (by
    /// position) whose detection failed. No partial result is returned.
    pub fn count_faces(&self, frames: &[RgbImage]) -> Result<Vec<usize>, FaceClipError> {
        self.count_indexed(frames, |position| position as u64)
    }

    /// Sample `source` once per unit and count faces in every sample.
    ///
    /// The progress callback in `options` fires once per batch.
    ///
    /// # Errors
    ///
    /// - [`FaceClipError::InvalidConfiguration`] if `options` do not
    ///   validate or the source reports a zero frame rate.
    /// - Errors from [`FrameSource::batch`], and
    ///   [`FaceClipError::VideoDecodeError`] if a batch comes back with a
    ///   different number of frames than requested.
    /// - [`FaceClipError::Detection`] if the detector fails on any frame.
    pub fn count_video<S: FrameSource>(
        &self,
        source: &mut S,
        options: &PipelineOptions,
    ) -> Result<FaceCountSequence, FaceClipError> {
        options.validate()?;

        let frames_per_unit = options.frames_per_unit(source.average_frame_rate());
        let indices = sample_indices(source.total_frames(), frames_per_unit)?;

        log::debug!(
            "Counting faces: {} samples of {} frames, {} frames per unit, batches of {}",
            indices.len(),
            source.total_frames(),
            frames_per_unit,
            options.batch_size,
        );

        let mut tracker = ProgressTracker::new(
            options.progress.clone(),
            OperationType::FaceCounting,
            Some(indices.len() as u64),
        );

        let mut counts = Vec::with_capacity(indices.len());
        for batch in indices.chunks(options.batch_size) {
            let frames = source.batch(batch, options.frame_size)?;
            if frames.len() != batch.len() {
                return Err(FaceClipError::VideoDecodeError(format!(
                    "source returned {} frames for a batch of {} starting at frame {}",
                    frames.len(),
                    batch.len(),
                    batch[0],
                )));
            }
            let batch_counts = self.count_indexed(&frames, |position| batch[position])?;
            counts.extend(batch_counts);
            tracker.advance(batch.len() as u64, batch.last().copied());
        }

        log::info!(
            "Counted faces in {} units ({} with at least one face)",
            counts.len(),
            counts.iter().filter(|&&count| count > 0).count(),
        );

        Ok(FaceCountSequence {
            counts,
            frames_per_unit,
        })
    }

    /// Detect in every frame; `frame_index` maps a position to the index
    /// reported in errors.
    #[cfg(not(feature = "rayon"))]
    fn count_indexed<F>(&self, frames: &[RgbImage], frame_index: F) -> Result<Vec<usize>, FaceClipError>
    where
        F: Fn(usize) -> u64,
    {
        frames
            .iter()
            .enumerate()
            .map(|(position, frame)| self.detect_one(frame, frame_index(position)))
            .collect()
    }

    /// Detect in every frame in parallel; output order matches input order.
    #[cfg(feature = "rayon")]
    fn count_indexed<F>(&self, frames: &[RgbImage], frame_index: F) -> Result<Vec<usize>, FaceClipError>
    where
        F: Fn(usize) -> u64 + Sync,
    {
        use ::rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};

        let results: Vec<Result<usize, FaceClipError>> = frames
            .par_iter()
            .enumerate()
            .map(|(position, frame)| self.detect_one(frame, frame_index(position)))
            .collect();

        // Report the earliest failure, not whichever worker lost the race.
        results.into_iter().collect()
    }

    fn detect_one(&self, frame: &RgbImage, frame_index: u64) -> Result<usize, FaceClipError> {
        self.detector
            .detect(frame)
            .map(|faces| faces.len())
            .map_err(|error| FaceClipError::Detection {
                frame_index,
                reason: error.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::{FaceCounter, sample_indices};
    use crate::detector::{DetectorFailure, FaceDetector, FaceLandmarks};
    use crate::error::FaceClipError;

    /// Red channel is the face count; a set green channel fails the frame.
    struct ChannelDetector;

    impl FaceDetector for ChannelDetector {
        fn detect(&self, frame: &RgbImage) -> Result<Vec<FaceLandmarks>, DetectorFailure> {
            let [faces, fail, _] = frame.get_pixel(0, 0).0;
            if fail > 0 {
                return Err(format!("bad frame {faces}").into());
            }
            Ok(vec![FaceLandmarks::default(); faces as usize])
        }
    }

    fn frames(failing: &[u8]) -> Vec<RgbImage> {
        (0..200u8)
            .map(|position| {
                let fail = if failing.contains(&position) { 1 } else { 0 };
                RgbImage::from_pixel(1, 1, Rgb([position, fail, 0]))
            })
            .collect()
    }

    // Runs on both the sequential and the `rayon` path.
    #[test]
    fn counts_keep_frame_order() {
        let counter = FaceCounter::new(ChannelDetector);
        let counts = counter.count_faces(&frames(&[])).unwrap();
        assert_eq!(counts, (0..200).collect::<Vec<usize>>());
    }

    #[test]
    fn earliest_failure_is_reported() {
        let counter = FaceCounter::new(ChannelDetector);
        for _ in 0..10 {
            match counter.count_faces(&frames(&[150, 17, 90])) {
                Err(FaceClipError::Detection { frame_index, reason }) => {
                    assert_eq!(frame_index, 17);
                    assert_eq!(reason, "bad frame 17");
                }
                other => panic!("expected a detection error, got {other:?}"),
            }
        }
    }

    #[test]
    fn last_partial_unit_is_dropped() {
        assert_eq!(sample_indices(330, 30).unwrap().len(), 10);
        assert_eq!(sample_indices(331, 30).unwrap().len(), 11);
        assert_eq!(*sample_indices(331, 30).unwrap().last().unwrap(), 300);
    }

    #[test]
    fn short_videos_have_no_samples() {
        assert!(sample_indices(0, 30).unwrap().is_empty());
        assert!(sample_indices(30, 30).unwrap().is_empty());
        assert_eq!(sample_indices(31, 30).unwrap(), vec![0]);
    }

    #[test]
    fn zero_step_is_rejected() {
        assert!(sample_indices(100, 0).is_err());
    }
}
