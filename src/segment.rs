//! Run segmentation and clip windowing.
//!
//! Given a face-count sequence (one entry per sampled unit), this module
//! finds the maximal runs whose face count equals a target and that last at
//! least a minimum number of units, maps them into native frame space, and
//! cuts them into windows of at most `max_clip_frames` frames.
//!
//! Two long-standing selection quirks are kept by default and can
//! be switched off through [`SegmentOptions`]:
//!
//! - A run still open when the sequence ends is never evaluated
//!   ([`flush_trailing_run`](SegmentOptions::flush_trailing_run)).
//! - Every window is `(cursor, cursor + max_clip_frames)`, so the last window
//!   of a run may reach past the run's end
//!   ([`clamp_window_end`](SegmentOptions::clamp_window_end)).
//!
//! # Example
//!
//! ```
//! use faceclip::{ClipWindow, SegmentOptions, select_windows};
//!
//! let mut counts = vec![1; 11];
//! counts.extend([2, 2, 2]);
//!
//! let windows = select_windows(&counts, 30, &SegmentOptions::default())?;
//! assert_eq!(windows, vec![ClipWindow::new(0, 700)]);
//! # Ok::<(), faceclip::FaceClipError>(())
//! ```

use crate::error::FaceClipError;

/// Parameters for run selection and windowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentOptions {
    /// Face count a run must have to qualify (default 1).
    pub target_face_count: usize,
    /// Minimum run length in units; a run of exactly this length qualifies
    /// (default 10).
    pub min_run_units: usize,
    /// Nominal window length in native frames (default 700).
    pub max_clip_frames: u64,
    /// Evaluate the run still open at the end of the sequence (default off).
    pub flush_trailing_run: bool,
    /// Clamp each window's end to its run's end frame (default off).
    pub clamp_window_end: bool,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            target_face_count: 1,
            min_run_units: 10,
            max_clip_frames: 700,
            flush_trailing_run: false,
            clamp_window_end: false,
        }
    }
}

impl SegmentOptions {
    /// Set the target face count.
    #[must_use]
    pub fn target_face_count(mut self, count: usize) -> Self {
        self.target_face_count = count;
        self
    }

    /// Set the minimum run length in units.
    #[must_use]
    pub fn min_run_units(mut self, units: usize) -> Self {
        self.min_run_units = units;
        self
    }

    /// Set the nominal window length in frames.
    #[must_use]
    pub fn max_clip_frames(mut self, frames: u64) -> Self {
        self.max_clip_frames = frames;
        self
    }

    /// Evaluate the trailing run as well.
    #[must_use]
    pub fn flush_trailing_run(mut self, flush: bool) -> Self {
        self.flush_trailing_run = flush;
        self
    }

    /// Clamp window ends to the run boundary.
    #[must_use]
    pub fn clamp_window_end(mut self, clamp: bool) -> Self {
        self.clamp_window_end = clamp;
        self
    }

    /// Check that the options can produce windows.
    ///
    /// # Errors
    ///
    /// Returns [`FaceClipError::InvalidConfiguration`] if
    /// `max_clip_frames` is zero.
    pub fn validate(&self) -> Result<(), FaceClipError> {
        if self.max_clip_frames == 0 {
            return Err(FaceClipError::InvalidConfiguration(
                "max clip frames must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    fn qualifies(&self, run: &Run) -> bool {
        run.value == self.target_face_count && run.len() >= self.min_run_units
    }
}

/// A maximal span of units sharing one face count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// The repeated face count.
    pub value: usize,
    /// First unit (inclusive).
    pub start: usize,
    /// One past the last unit.
    pub end: usize,
}

impl Run {
    /// Length in units.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` for a zero-length run.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A native frame range selected for export, `[start_frame, end_frame)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipWindow {
    /// First frame (inclusive).
    pub start_frame: u64,
    /// One past the last frame. May exceed the video's frame count.
    pub end_frame: u64,
}

impl ClipWindow {
    /// Create a window.
    pub fn new(start_frame: u64, end_frame: u64) -> Self {
        Self {
            start_frame,
            end_frame,
        }
    }

    /// Nominal length in frames.
    pub fn len(&self) -> u64 {
        self.end_frame.saturating_sub(self.start_frame)
    }

    /// Returns `true` if the window covers no frame.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// End frame bounded by the number of frames actually available.
    pub fn clamped_end(&self, total_frames: u64) -> u64 {
        self.end_frame.min(total_frames)
    }
}

/// Every maximal run in `counts`, in order, including the trailing one.
///
/// # Example
///
/// ```
/// use faceclip::{Run, runs};
///
/// assert_eq!(
///     runs(&[0, 0, 1, 1, 1]),
///     vec![
///         Run { value: 0, start: 0, end: 2 },
///         Run { value: 1, start: 2, end: 5 },
///     ],
/// );
/// ```
pub fn runs(counts: &[usize]) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut open: Option<Run> = None;

    for (index, &value) in counts.iter().enumerate() {
        match open {
            None => open = Some(Run { value, start: index, end: index }),
            Some(run) if run.value != value => {
                runs.push(Run { end: index, ..run });
                open = Some(Run { value, start: index, end: index });
            }
            Some(_) => {}
        }
    }

    if let Some(run) = open {
        runs.push(Run { end: counts.len(), ..run });
    }

    runs
}

/// Runs selected for export.
///
/// A run qualifies when it is closed by a change of value, its value equals
/// `target_face_count`, and its length is at least `min_run_units`. The run
/// reaching the end of the sequence is only considered when
/// `flush_trailing_run` is set.
pub fn eligible_runs(counts: &[usize], options: &SegmentOptions) -> Vec<Run> {
    let mut all = runs(counts);
    if !options.flush_trailing_run {
        all.pop();
    }
    all.retain(|run| options.qualifies(run));
    all
}

/// Cut `[start_frame, end_frame)` into windows of `max_frames`.
///
/// Windows start at `start_frame` and advance by `max_frames` while the
/// cursor is below `end_frame`. Without `clamp`, each window is a full
/// `max_frames` long, so the last one may reach past `end_frame`.
///
/// # Errors
///
/// Returns [`FaceClipError::InvalidConfiguration`] if `max_frames` is zero.
pub fn split_into_windows(
    start_frame: u64,
    end_frame: u64,
    max_frames: u64,
    clamp: bool,
) -> Result<Vec<ClipWindow>, FaceClipError> {
    if max_frames == 0 {
        return Err(FaceClipError::InvalidConfiguration(
            "max clip frames must be greater than zero".to_string(),
        ));
    }

    let mut windows = Vec::new();
    let mut cursor = start_frame;
    while cursor < end_frame {
        let end = cursor.saturating_add(max_frames);
        windows.push(ClipWindow::new(cursor, if clamp { end.min(end_frame) } else { end }));
        cursor = end;
    }
    Ok(windows)
}

/// Windows for every eligible run, in sequence order.
///
/// Unit `i` maps to native frame `i * frames_per_unit`. The result depends
/// only on the arguments.
///
/// # Errors
///
/// Returns [`FaceClipError::InvalidConfiguration`] if `options` do not
/// validate.
pub fn select_windows(
    counts: &[usize],
    frames_per_unit: u64,
    options: &SegmentOptions,
) -> Result<Vec<ClipWindow>, FaceClipError> {
    options.validate()?;

    let mut windows = Vec::new();
    for run in eligible_runs(counts, options) {
        let start_frame = run.start as u64 * frames_per_unit;
        let end_frame = run.end as u64 * frames_per_unit;
        log::debug!(
            "Run of {} face(s) over units [{}, {}) → frames [{start_frame}, {end_frame})",
            run.value,
            run.start,
            run.end,
        );
        windows.extend(split_into_windows(
            start_frame,
            end_frame,
            options.max_clip_frames,
            options.clamp_window_end,
        )?);
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_cover_sequence() {
        let counts = [2, 2, 0, 1, 1, 1, 0];
        let all = runs(&counts);
        assert_eq!(all.len(), 4);
        assert_eq!(all.iter().map(Run::len).sum::<usize>(), counts.len());
        assert_eq!(all[3], Run { value: 0, start: 6, end: 7 });
    }

    #[test]
    fn trailing_run_dropped_unless_flushed() {
        let counts = [0, 1, 1, 1];
        let options = SegmentOptions::default().min_run_units(3);
        assert!(eligible_runs(&counts, &options).is_empty());

        let flushed = options.flush_trailing_run(true);
        assert_eq!(
            eligible_runs(&counts, &flushed),
            vec![Run { value: 1, start: 1, end: 4 }]
        );
    }

    #[test]
    fn window_split_without_clamp() {
        let windows = split_into_windows(100, 1500, 700, false).unwrap();
        assert_eq!(
            windows,
            vec![
                ClipWindow::new(100, 800),
                ClipWindow::new(800, 1500),
            ]
        );
        let windows = split_into_windows(0, 701, 700, false).unwrap();
        assert_eq!(windows.last(), Some(&ClipWindow::new(700, 1400)));
    }

    #[test]
    fn window_split_with_clamp() {
        let windows = split_into_windows(0, 701, 700, true).unwrap();
        assert_eq!(windows, vec![ClipWindow::new(0, 700), ClipWindow::new(700, 701)]);
    }

    #[test]
    fn zero_window_length_rejected() {
        assert!(split_into_windows(0, 10, 0, false).is_err());
        let options = SegmentOptions::default().max_clip_frames(0);
        assert!(select_windows(&[1, 1, 0], 30, &options).is_err());
    }
}
