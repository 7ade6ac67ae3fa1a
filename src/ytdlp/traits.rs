//! Episode source trait
//!
//! The external retrieval executable is modeled as a trait so the pipeline
//! can be tested against in-memory fakes and so alternative sources (the
//! TVer platform API, a different extractor binary) can be plugged in.

use crate::Result;
use crate::types::{DownloadResult, Episode};
use async_trait::async_trait;

/// Callback invoked with batch-level progress values
///
/// The value is `completed_items + in_item_fraction`, monotonically
/// non-decreasing across one download call. Invoked synchronously from the
/// task that owns the child-process read loop.
pub type ProgressFn<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Source of candidate episodes and executor of downloads
#[async_trait]
pub trait EpisodeSource: Send + Sync {
    /// Extract candidate episodes from a series page
    ///
    /// Extraction calls are serialized process-wide even when series are
    /// processed concurrently; the underlying executable is not guaranteed
    /// safe for concurrent invocation.
    async fn extract_episodes(&self, series_url: &str) -> Result<Vec<Episode>>;

    /// Download the given episodes, streaming progress as items advance
    ///
    /// Returns one [`DownloadResult`] per item the executable confirmed
    /// complete. A non-zero exit preserves whatever partial results were
    /// parsed; exit 0 with zero results is valid (nothing new to do).
    async fn download(
        &self,
        episodes: &[Episode],
        series_name: &str,
        category: Option<&str>,
        on_progress: ProgressFn<'_>,
    ) -> Result<Vec<DownloadResult>>;
}
