//! Core types shared across the pipeline

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A candidate episode extracted from a series page or the platform API
///
/// Episodes are produced fresh for every extraction call and are not
/// persisted by the core; the durable record is created only after a
/// successful download (see [`crate::tracker`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    /// Platform-assigned episode id (e.g., "epxxxxxxxx")
    pub id: String,
    /// Human-readable title, used for filtering and sidecar matching
    pub title: String,
    /// Canonical episode page URL
    pub url: String,
    /// Season name this episode belongs to, when known (platform API only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_name: Option<String>,
    /// Episode number within the season, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_number: Option<i32>,
    /// Broadcast date label as reported by the platform (free-form text)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast_date: Option<String>,
}

impl Episode {
    /// Create a minimal episode from extractor output (id, title, url)
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            season_name: None,
            episode_number: None,
            broadcast_date: None,
        }
    }
}

/// Subtitle sidecar format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    /// WebVTT (.vtt)
    Vtt,
    /// SubRip (.srt)
    Srt,
    /// Advanced SubStation Alpha (.ass)
    Ass,
}

impl SubtitleFormat {
    /// All sidecar extensions probed for, in probe order
    pub const ALL: [SubtitleFormat; 3] = [Self::Vtt, Self::Srt, Self::Ass];

    /// The file extension for this format (without the dot)
    pub fn extension(self) -> &'static str {
        match self {
            Self::Vtt => "vtt",
            Self::Srt => "srt",
            Self::Ass => "ass",
        }
    }

    /// Map a file extension to a subtitle format
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "vtt" => Some(Self::Vtt),
            "srt" => Some(Self::Srt),
            "ass" => Some(Self::Ass),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Result of one successfully downloaded episode
///
/// Created only after the external process confirms completion of that item
/// via a result marker line; immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    /// Name of the series this episode belongs to
    pub series_name: String,
    /// Episode title (taken from the original filter-matched candidate,
    /// not from the marker line, so filter semantics are preserved)
    pub episode_title: String,
    /// Canonical episode URL (from the original candidate)
    pub url: String,
    /// Episode number, when the marker carried one
    pub episode_number: Option<i32>,
    /// Resolved path of the downloaded file
    pub file_path: PathBuf,
    /// Whether a subtitle sidecar exists for this episode
    pub has_subtitles: bool,
    /// Format of the sidecar, when present
    pub subtitle_format: Option<SubtitleFormat>,
}

/// Externally observable per-series pipeline status
///
/// Each transition of the per-series state machine updates this label via
/// the [`crate::progress::ProgressSink`]. The `UpToDate`, `NoEpisodes`,
/// `NoMatches`, `Completed` and `Failed` variants are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SeriesStatus {
    /// Queued, not yet picked up by a worker
    Pending,
    /// Extracting candidate episodes from the series page
    Extracting,
    /// Applying include/exclude/season filters
    Filtering,
    /// Checking candidates against the history store
    Deduplicating,
    /// Download in progress
    Downloading,
    /// Recording results in the history store
    Recording,
    /// Extraction returned no episodes
    NoEpisodes,
    /// No episode passed the filter
    NoMatches,
    /// Everything matching was already downloaded
    UpToDate,
    /// Finished with at least one processed episode
    Completed {
        /// Number of episodes downloaded this run
        downloaded: usize,
    },
    /// Series processing failed; siblings are unaffected
    Failed {
        /// Error message, reported by series name
        error: String,
    },
}

impl SeriesStatus {
    /// Returns `true` for terminal states
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NoEpisodes
                | Self::NoMatches
                | Self::UpToDate
                | Self::Completed { .. }
                | Self::Failed { .. }
        )
    }
}

/// Per-series outcome summary for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesReport {
    /// Titles downloaded successfully this run
    pub downloaded: Vec<String>,
    /// Titles downloaded without a subtitle sidecar
    pub missing_subtitles: Vec<String>,
}

/// Aggregate outcome of a full pipeline run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Number of series processed (enabled series submitted to workers)
    pub series_processed: usize,
    /// Total episodes downloaded across all series
    pub episodes_downloaded: usize,
    /// Per-series reports, keyed by series name
    pub reports: std::collections::HashMap<String, SeriesReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtitle_format_extension_round_trip() {
        for format in SubtitleFormat::ALL {
            assert_eq!(SubtitleFormat::from_extension(format.extension()), Some(format));
        }
        assert_eq!(SubtitleFormat::from_extension("mp4"), None);
    }

    #[test]
    fn test_series_status_terminal() {
        assert!(!SeriesStatus::Extracting.is_terminal());
        assert!(!SeriesStatus::Downloading.is_terminal());
        assert!(SeriesStatus::UpToDate.is_terminal());
        assert!(SeriesStatus::Completed { downloaded: 2 }.is_terminal());
        assert!(
            SeriesStatus::Failed {
                error: "x".to_string()
            }
            .is_terminal()
        );
    }

    #[test]
    fn test_episode_new_has_no_optional_fields() {
        let ep = Episode::new("ep1", "第1話", "https://tver.jp/episodes/ep1");
        assert_eq!(ep.season_name, None);
        assert_eq!(ep.episode_number, None);
        assert_eq!(ep.broadcast_date, None);
    }
}
