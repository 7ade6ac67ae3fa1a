//! # tver-dl
//!
//! An automated episode download pipeline for the TVer streaming platform,
//! built around yt-dlp as the retrieval engine.
//!
//! ## Features
//!
//! - **Series pipeline**: extract → filter → dedup → download → record,
//!   fanned out across a bounded pool of concurrent series workers
//! - **Episode filtering**: include/exclude substring patterns plus
//!   season targeting, applied per configured series
//! - **Download history**: pluggable tracker with a flat-file backend and
//!   a PostgreSQL backend, keyed by episode URL
//! - **Streaming execution**: yt-dlp output is consumed line by line for
//!   per-item result markers and fractional progress
//! - **Subtitle awareness**: sidecar detection after download, plus a
//!   subtitles-only mode for backfilling missing sidecars
//! - **Platform API client**: optional season/episode discovery through
//!   the TVer platform API
//!
//! ## Architecture
//!
//! The crate is a library; the embedding application supplies
//! configuration and an optional [`ProgressSink`] and calls
//! [`TverDownloader::run`]. The main components:
//!
//! - [`TverDownloader`]: pipeline orchestrator and worker pool
//! - [`ytdlp::CliYtdlp`]: the yt-dlp subprocess executor (an
//!   [`EpisodeSource`] implementation)
//! - [`tracker::Tracker`]: download history (flat file or PostgreSQL)
//! - [`filter`]: per-series episode title filtering
//! - [`tver::TverClient`]: TVer platform API client
//!
//! ## Example
//!
//! ```no_run
//! use tver_dl::{Config, SeriesConfig, TverDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     let mut series =
//!         SeriesConfig::new("Example", "https://tver.jp/series/sr123abc");
//!     series.include_patterns.push("第".to_string());
//!     series.exclude_patterns.push("予告".to_string());
//!     config.series.push(series);
//!
//!     let downloader = TverDownloader::new(config).await?;
//!     let summary = downloader.run().await?;
//!     println!("downloaded {} episode(s)", summary.episodes_downloaded);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod config;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod progress;
pub mod subtitles;
pub mod tracker;
pub mod tver;
pub mod types;
pub mod ytdlp;

pub use config::{Config, DownloadConfig, HistoryBackend, HistoryConfig, SeriesConfig, YtdlpConfig};
pub use error::{DatabaseError, Error, Result};
pub use pipeline::TverDownloader;
pub use progress::{NoOpProgress, ProgressSink};
pub use tracker::Tracker;
pub use types::{
    DownloadResult, Episode, RunSummary, SeriesReport, SeriesStatus, SubtitleFormat,
};
pub use ytdlp::{CliYtdlp, EpisodeSource};
