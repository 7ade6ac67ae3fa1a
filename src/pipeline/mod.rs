//! Series pipeline orchestration
//!
//! Composes the filter, tracker and download executor into the per-series
//! workflow and fans it out across a bounded worker pool:
//!
//! extract → filter → dedup (tracker) → download → record
//!
//! Every stage updates an externally observable [`SeriesStatus`] through
//! the configured [`ProgressSink`]. Errors raised while processing one
//! series are contained at the series boundary, logged with the series
//! name, and never abort sibling series; a run always waits for all
//! submitted tasks.

use crate::config::{Config, SeriesConfig};
use crate::error::Result;
use crate::filter;
use crate::progress::{NoOpProgress, ProgressSink};
use crate::tracker::{self, Tracker};
use crate::types::{Episode, RunSummary, SeriesReport, SeriesStatus};
use crate::ytdlp::{CliYtdlp, EpisodeSource};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

/// Main pipeline instance (cloneable: all fields are Arc-wrapped)
///
/// # Examples
///
/// ```no_run
/// use tver_dl::{Config, TverDownloader};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let downloader = TverDownloader::new(config).await?;
///     let summary = downloader.run().await?;
///     println!("downloaded {} episode(s)", summary.episodes_downloaded);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct TverDownloader {
    config: Arc<Config>,
    tracker: Arc<dyn Tracker>,
    source: Arc<dyn EpisodeSource>,
    progress: Arc<dyn ProgressSink>,
}

impl TverDownloader {
    /// Create a pipeline from configuration
    ///
    /// Validates the configuration (fatal errors abort here, before any
    /// series is processed), selects the history backend, and discovers
    /// the yt-dlp binary.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let tracker = tracker::from_config(&config).await?;
        let source: Arc<dyn EpisodeSource> = Arc::new(CliYtdlp::from_config(&config)?);
        Self::from_parts(config, source, tracker)
    }

    /// Create a pipeline from pre-built components
    ///
    /// The seam used by tests and by embedders that bring their own
    /// episode source or tracker.
    pub fn from_parts(
        config: Config,
        source: Arc<dyn EpisodeSource>,
        tracker: Arc<dyn Tracker>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            tracker,
            source,
            progress: Arc::new(NoOpProgress),
        })
    }

    /// Attach a progress sink (replaces the default no-op sink)
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Process all enabled series, fanning out across the worker pool
    ///
    /// Returns once every submitted series task has finished. There is no
    /// cancellation primitive: per-series failures are contained and
    /// reported, and the run always waits for all tasks.
    pub async fn run(&self) -> Result<RunSummary> {
        let enabled: Vec<SeriesConfig> = self
            .config
            .series
            .iter()
            .filter(|s| s.enabled)
            .cloned()
            .collect();

        if enabled.is_empty() {
            tracing::warn!("no enabled series configured");
            return Ok(RunSummary::default());
        }

        tracing::info!(
            series = enabled.len(),
            workers = self.config.download.max_concurrent_series,
            "starting pipeline run"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.download.max_concurrent_series));
        let mut tasks: JoinSet<(String, SeriesReport)> = JoinSet::new();

        for series in enabled {
            self.progress.status(&series.name, SeriesStatus::Pending);
            let pipeline = self.clone();
            let semaphore = Arc::clone(&semaphore);

            // Each task owns the series value it was given and reports
            // errors by that value directly
            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (series.name.clone(), SeriesReport::default()),
                };
                pipeline.process_series_contained(series).await
            });
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, report)) => {
                    summary.series_processed += 1;
                    summary.episodes_downloaded += report.downloaded.len();
                    summary.reports.insert(name, report);
                }
                Err(e) => {
                    tracing::error!(error = %e, "series task panicked");
                }
            }
        }

        tracing::info!(
            series = summary.series_processed,
            episodes = summary.episodes_downloaded,
            "pipeline run complete"
        );
        Ok(summary)
    }

    /// Per-series error boundary: failures are logged with the series name
    /// and turned into a terminal `Failed` status, never propagated
    async fn process_series_contained(&self, series: SeriesConfig) -> (String, SeriesReport) {
        let name = series.name.clone();
        match self.process_series(&series).await {
            Ok(report) => (name, report),
            Err(e) => {
                tracing::error!(series = %name, error = %e, "series processing failed");
                self.progress.status(
                    &name,
                    SeriesStatus::Failed {
                        error: e.to_string(),
                    },
                );
                (name, SeriesReport::default())
            }
        }
    }

    async fn process_series(&self, series: &SeriesConfig) -> Result<SeriesReport> {
        let name = series.name.as_str();

        self.progress.status(name, SeriesStatus::Extracting);
        let episodes = match self.source.extract_episodes(&series.url).await {
            Ok(episodes) => episodes,
            Err(e) => {
                // Transient collaborator failure: treated as no data
                tracing::warn!(series = %name, error = %e, "extraction failed");
                Vec::new()
            }
        };
        if episodes.is_empty() {
            tracing::info!(series = %name, "no episodes found");
            self.progress.status(name, SeriesStatus::NoEpisodes);
            return Ok(SeriesReport::default());
        }

        self.progress.status(name, SeriesStatus::Filtering);
        let matched: Vec<Episode> = episodes
            .into_iter()
            .filter(|ep| filter::should_download(ep, series))
            .collect();
        if matched.is_empty() {
            tracing::info!(series = %name, "no episodes match filter criteria");
            self.progress.status(name, SeriesStatus::NoMatches);
            return Ok(SeriesReport::default());
        }

        self.progress.status(name, SeriesStatus::Deduplicating);
        let mut fresh: Vec<Episode> = Vec::with_capacity(matched.len());
        for episode in matched {
            if self.tracker.has_episode(&episode.url).await {
                tracing::debug!(series = %name, title = %episode.title, "already downloaded");
            } else {
                fresh.push(episode);
            }
        }
        if fresh.is_empty() {
            tracing::info!(series = %name, "all matching episodes already downloaded");
            self.progress.status(name, SeriesStatus::UpToDate);
            return Ok(SeriesReport::default());
        }

        tracing::info!(series = %name, count = fresh.len(), "downloading new episodes");
        self.progress.status(name, SeriesStatus::Downloading);

        // Establish the expected total before the first callback fires
        let total = fresh.len();
        self.progress.progress(name, 0.0, total);
        let sink = Arc::clone(&self.progress);
        let progress_name = name.to_string();
        let on_progress = move |value: f64| sink.progress(&progress_name, value, total);

        let results = self
            .source
            .download(&fresh, name, series.category.as_deref(), &on_progress)
            .await?;

        self.progress.status(name, SeriesStatus::Recording);
        let by_url: HashMap<&str, &Episode> =
            fresh.iter().map(|ep| (ep.url.as_str(), ep)).collect();

        let mut report = SeriesReport::default();
        for result in &results {
            if let Some(episode) = by_url.get(result.url.as_str()) {
                // Persistence failure degrades durability, never the run
                if let Err(e) = self.tracker.record_download(series, episode, result).await {
                    tracing::error!(
                        series = %name,
                        title = %result.episode_title,
                        error = %e,
                        "failed to record download"
                    );
                }
            }

            report.downloaded.push(result.episode_title.clone());
            if !result.has_subtitles {
                report.missing_subtitles.push(result.episode_title.clone());
            }
        }

        self.progress.status(
            name,
            SeriesStatus::Completed {
                downloaded: results.len(),
            },
        );
        Ok(report)
    }
}
