//! Configuration types for tver-dl
//!
//! The library does not load configuration files itself; consumers build a
//! [`Config`] programmatically or deserialize one from whatever format they
//! prefer. All fields carry sensible defaults so `Config::default()` works
//! out of the box. Validation happens once, at startup, via
//! [`Config::validate`]; the core never re-validates on access.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// One configured series to track
///
/// Owned by configuration; read-only to the core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Display name of the series
    pub name: String,
    /// Series page URL (the platform series id is its last path segment)
    pub url: String,
    /// Whether this series is processed at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Substring patterns a title must contain to be included (OR logic).
    /// Matching is case-sensitive with no normalization; patterns commonly
    /// use the platform's episode markers such as "第" or "＃".
    #[serde(default)]
    pub include_patterns: Vec<String>,
    /// Substring patterns that exclude a title outright (e.g., "予告")
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Season names to target. When non-empty this overrides all pattern
    /// filtering: only episodes whose season is listed here are included.
    #[serde(default)]
    pub target_seasons: Vec<String>,
    /// Optional category subdirectory under the download root
    #[serde(default)]
    pub category: Option<String>,
}

impl SeriesConfig {
    /// Create a series config with defaults for all filter fields
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            enabled: true,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            target_seasons: Vec::new(),
            category: None,
        }
    }
}

/// Download behavior configuration (directories, concurrency)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Download directory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum series processed concurrently (default: 3)
    ///
    /// Download steps within a series are sequential; this bounds only the
    /// series-level fan-out.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_series: usize,

    /// Only fetch missing subtitle sidecars, skipping video downloads
    #[serde(default)]
    pub subtitles_only: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent_series: default_max_concurrent(),
            subtitles_only: false,
        }
    }
}

/// History store backend selection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryBackend {
    /// Append-mostly delimited text file (default)
    #[default]
    FlatFile,
    /// PostgreSQL database reachable via `database_url`
    Postgres,
}

/// History tracker configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Which tracker backend to use (default: flat file)
    #[serde(default)]
    pub backend: HistoryBackend,

    /// Path of the flat-file history (default: "history.csv" under the
    /// download directory; a relative path here is resolved against it)
    #[serde(default = "default_history_file")]
    pub file_path: PathBuf,

    /// PostgreSQL connection string; required when `backend` is `Postgres`
    #[serde(default)]
    pub database_url: Option<String>,

    /// Host identifier recorded with each download (default: the HOSTNAME
    /// environment variable, falling back to "unknown")
    #[serde(default)]
    pub host_label: Option<String>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: HistoryBackend::FlatFile,
            file_path: default_history_file(),
            database_url: None,
            host_label: None,
        }
    }
}

impl HistoryConfig {
    /// Resolve the host label, falling back to the environment
    pub fn resolved_host_label(&self) -> String {
        self.host_label.clone().unwrap_or_else(|| {
            std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
        })
    }
}

/// External retrieval executable (yt-dlp) configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct YtdlpConfig {
    /// Path to the yt-dlp executable (auto-detected from PATH if None)
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Extra pass-through arguments for the download invocation
    /// (e.g., output template, format selection)
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Time bound for the metadata extraction call (default: 60s).
    /// The download phase is not time-bounded.
    #[serde(default = "default_extract_timeout", with = "duration_secs")]
    pub extract_timeout: Duration,

    /// How many playlist items extraction is bounded to (default: 10)
    #[serde(default = "default_playlist_limit")]
    pub playlist_limit: u32,

    /// Subtitle languages requested in subtitles-only mode (default: ["ja"])
    #[serde(default = "default_subtitle_langs")]
    pub subtitle_langs: Vec<String>,
}

impl Default for YtdlpConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            extra_args: Vec::new(),
            extract_timeout: default_extract_timeout(),
            playlist_limit: default_playlist_limit(),
            subtitle_langs: default_subtitle_langs(),
        }
    }
}

/// Main configuration for [`crate::TverDownloader`]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Series to track
    #[serde(default)]
    pub series: Vec<SeriesConfig>,

    /// Download behavior
    #[serde(default)]
    pub download: DownloadConfig,

    /// History tracker selection and settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// External retrieval executable settings
    #[serde(default)]
    pub ytdlp: YtdlpConfig,
}

impl Config {
    /// Validate the configuration, returning the first fatal error
    ///
    /// Fatal errors abort before any series is processed. Everything the
    /// validator does not reject is handled at runtime with per-series
    /// containment.
    pub fn validate(&self) -> crate::Result<()> {
        if self.download.max_concurrent_series == 0 {
            return Err(crate::Error::config(
                "max_concurrent_series must be at least 1",
                "download.max_concurrent_series",
            ));
        }

        if self.history.backend == HistoryBackend::Postgres
            && self
                .history
                .database_url
                .as_deref()
                .is_none_or(|url| url.is_empty())
        {
            return Err(crate::Error::config(
                "postgres history backend requires a database_url",
                "history.database_url",
            ));
        }

        Ok(())
    }

    /// Resolve the flat-file history path against the download directory
    pub fn history_file_path(&self) -> PathBuf {
        if self.history.file_path.is_absolute() {
            self.history.file_path.clone()
        } else {
            self.download.download_dir.join(&self.history.file_path)
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_history_file() -> PathBuf {
    PathBuf::from("history.csv")
}

fn default_extract_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_playlist_limit() -> u32 {
    10
}

fn default_subtitle_langs() -> Vec<String> {
    vec!["ja".to_string()]
}

/// Serialize/deserialize a `Duration` as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
