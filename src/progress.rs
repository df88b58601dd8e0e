//! Progress reporting.
//!
//! Face counting and clip export can take minutes per video. Attach a
//! [`ProgressCallback`] through
//! [`PipelineOptions::with_progress`](crate::PipelineOptions::with_progress)
//! to observe them.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use faceclip::{PipelineOptions, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("[{:?}] {pct:.1}% complete", info.operation);
//!         }
//!     }
//! }
//!
//! let options = PipelineOptions::new().with_progress(Arc::new(PrintProgress));
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

/// The kind of work currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Running the detector over sampled frames.
    FaceCounting,
    /// Re-encoding selected windows into clip files.
    ClipExport,
}

/// A snapshot of progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What kind of work is being performed.
    pub operation: OperationType,
    /// How many items (sampled frames or clips) have been processed so far.
    pub current: u64,
    /// Total items expected, if known ahead of time.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since the operation started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// The native frame index most recently processed, if any.
    pub current_frame: Option<u64>,
}

/// Receives progress updates.
///
/// Implementations must be [`Send`] and [`Sync`]: the callback may be invoked
/// from rayon workers. Callbacks observe but cannot halt an operation.
pub trait ProgressCallback: Send + Sync {
    /// Called after each unit of work.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Tracks timing for one operation and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    current: u64,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            current: 0,
            start_time: Instant::now(),
        }
    }

    /// Record `count` completed items and report.
    pub(crate) fn advance(&mut self, count: u64, frame_number: Option<u64>) {
        self.current += count;
        self.report(frame_number);
    }

    fn report(&self, frame_number: Option<u64>) {
        let elapsed = self.start_time.elapsed();

        let percentage = self
            .total
            .filter(|&t| t > 0)
            .map(|t| (self.current as f32 / t as f32) * 100.0);

        let estimated_remaining = if self.current > 0 {
            self.total.map(|t| {
                let remaining = t.saturating_sub(self.current);
                elapsed.mul_f64(remaining as f64 / self.current as f64)
            })
        } else {
            None
        };

        self.callback.on_progress(&ProgressInfo {
            operation: self.operation,
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_frame: frame_number,
        });
    }
}
