//! Download history tracking
//!
//! The tracker is the durable record of "this episode URL has been
//! successfully downloaded", used to prevent redundant downloads across
//! runs. Two interchangeable backends exist:
//! - [`FlatFileTracker`]: append-mostly delimited text file
//! - [`PostgresTracker`]: relational store with per-entity upserts
//!
//! The concrete backend is selected once at startup from configuration and
//! never switched at runtime. Dedup failures never abort a run: a tracker
//! that cannot answer reports the episode as not downloaded, risking only a
//! redundant download.

use crate::config::{Config, HistoryBackend, SeriesConfig};
use crate::error::Result;
use crate::types::{DownloadResult, Episode};
use async_trait::async_trait;
use std::sync::Arc;

mod flat_file;
mod postgres;

pub use flat_file::FlatFileTracker;
pub use postgres::PostgresTracker;

/// Durable dedup and record store for successful downloads
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Whether this episode URL already has a successful download recorded
    ///
    /// Never errors: backend failures are logged and reported as `false`,
    /// so a broken store degrades to redundant work instead of aborting.
    async fn has_episode(&self, url: &str) -> bool;

    /// Record one successful download
    ///
    /// Re-recording the same episode is an upsert, never a duplicate. The
    /// caller logs and swallows errors; a persistence failure degrades
    /// durability but must not crash the pipeline.
    async fn record_download(
        &self,
        series: &SeriesConfig,
        episode: &Episode,
        result: &DownloadResult,
    ) -> Result<()>;
}

/// Build the tracker selected by configuration
///
/// Assumes [`Config::validate`] has passed; a postgres backend without a
/// connection string is rejected there, before any series is processed.
pub async fn from_config(config: &Config) -> Result<Arc<dyn Tracker>> {
    match config.history.backend {
        HistoryBackend::FlatFile => {
            let tracker = FlatFileTracker::new(config.history_file_path()).await?;
            Ok(Arc::new(tracker))
        }
        HistoryBackend::Postgres => {
            let url = config.history.database_url.as_deref().ok_or_else(|| {
                crate::Error::config(
                    "postgres history backend requires a database_url",
                    "history.database_url",
                )
            })?;
            let tracker = PostgresTracker::connect(url, config.history.resolved_host_label())?;
            if let Err(e) = tracker.ensure_schema().await {
                // The schema may already exist and the store may be briefly
                // unreachable; later calls fail soft per the error taxonomy
                tracing::warn!(error = %e, "history schema bootstrap failed");
            }
            Ok(Arc::new(tracker))
        }
    }
}
