//! Progress reporting boundary
//!
//! The pipeline reports per-series state transitions and download progress
//! through a [`ProgressSink`]. Implementations are provided by the embedding
//! application (terminal renderer, GUI bridge, ...); the library ships only
//! a no-op sink.
//!
//! Callbacks are invoked synchronously from whichever worker task owns the
//! corresponding series, so implementations must be safe to call from
//! multiple tasks concurrently.

use crate::types::SeriesStatus;

/// Sink for externally observable pipeline progress
pub trait ProgressSink: Send + Sync {
    /// A series transitioned to a new pipeline state
    fn status(&self, series_name: &str, status: SeriesStatus);

    /// Download progress for a series: `completed` is the count of fully
    /// finished items plus the fractional progress of the item currently
    /// being processed, so values are monotonically non-decreasing and end
    /// at the number of completed items. `total` is the expected item count
    /// established on entry to the download phase.
    fn progress(&self, series_name: &str, completed: f64, total: usize);
}

/// Progress sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgress;

impl ProgressSink for NoOpProgress {
    fn status(&self, _series_name: &str, _status: SeriesStatus) {}

    fn progress(&self, _series_name: &str, _completed: f64, _total: usize) {}
}
