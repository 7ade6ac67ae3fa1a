//! CLI-based episode source using the external yt-dlp binary

use super::parser::{parse_extract_line, parse_progress_line, parse_result_line};
use super::traits::{EpisodeSource, ProgressFn};
use crate::config::{Config, YtdlpConfig};
use crate::error::{Error, Result};
use crate::subtitles;
use crate::types::{DownloadResult, Episode};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;

/// Upper bound on retained child stderr, kept for the failure log
const STDERR_TAIL_LIMIT: usize = 8 * 1024;

/// Episode source backed by the yt-dlp executable
///
/// Extraction runs yt-dlp in a metadata-only mode bounded to the first
/// playlist items and a configurable timeout. Downloads spawn yt-dlp as a
/// child process and consume its standard output line-by-line while it
/// runs, so progress is observable in real time.
///
/// # Examples
///
/// ```no_run
/// use tver_dl::ytdlp::CliYtdlp;
/// use tver_dl::Config;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let ytdlp = CliYtdlp::from_config(&config)?;
/// # Ok(())
/// # }
/// ```
pub struct CliYtdlp {
    binary_path: PathBuf,
    download_dir: PathBuf,
    subtitles_only: bool,
    options: YtdlpConfig,
    /// Serializes extraction calls across all series; yt-dlp is not
    /// guaranteed safe for concurrent invocation against the same cache
    extract_lock: Mutex<()>,
}

impl CliYtdlp {
    /// Create a client with an explicit binary path
    pub fn new(binary_path: PathBuf, download_dir: PathBuf, options: YtdlpConfig) -> Self {
        Self {
            binary_path,
            download_dir,
            subtitles_only: false,
            options,
            extract_lock: Mutex::new(()),
        }
    }

    /// Build a client from configuration, discovering the binary if needed
    ///
    /// Uses the configured `ytdlp.binary_path` when set, otherwise searches
    /// PATH for `yt-dlp`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let binary_path = match &config.ytdlp.binary_path {
            Some(path) => path.clone(),
            None => which::which("yt-dlp")
                .map_err(|e| Error::ExternalTool(format!("yt-dlp not found in PATH: {}", e)))?,
        };

        let mut client = Self::new(
            binary_path,
            config.download.download_dir.clone(),
            config.ytdlp.clone(),
        );
        client.subtitles_only = config.download.subtitles_only;
        Ok(client)
    }

    /// Enable or disable subtitles-only mode
    pub fn subtitles_only(mut self, enabled: bool) -> Self {
        self.subtitles_only = enabled;
        self
    }

    fn output_dir(&self, category: Option<&str>) -> PathBuf {
        match category {
            Some(category) => self.download_dir.join(category),
            None => self.download_dir.clone(),
        }
    }

    /// Pass-through options with any output template stripped
    ///
    /// In subtitles-only mode the configured output template would redirect
    /// sidecars away from the existing video files, so `-o`/`--output` and
    /// its value are dropped.
    fn base_download_args(&self) -> Vec<String> {
        if !self.subtitles_only {
            return self.options.extra_args.clone();
        }

        let mut args = Vec::with_capacity(self.options.extra_args.len() + 4);
        let mut skip_value = false;
        for arg in &self.options.extra_args {
            if skip_value {
                skip_value = false;
                continue;
            }
            if arg == "-o" || arg == "--output" {
                skip_value = true;
                continue;
            }
            args.push(arg.clone());
        }

        args.insert(0, "--skip-download".to_string());
        if !args.iter().any(|a| a == "--write-subs") {
            args.push("--write-subs".to_string());
        }
        args.push("--sub-langs".to_string());
        args.push(self.options.subtitle_langs.join(","));
        args
    }

    fn download_command(&self, urls: &[&str], output_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.args(self.base_download_args())
            .arg("--no-warnings")
            .arg("--newline")
            .arg("-P")
            .arg(output_dir)
            .arg("--print")
            .arg("after_move:RESULT:%(id)s|%(episode_number)s|%(filepath)s|%(title)s")
            .args(urls)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl EpisodeSource for CliYtdlp {
    async fn extract_episodes(&self, series_url: &str) -> Result<Vec<Episode>> {
        tracing::info!(url = %series_url, "extracting episodes with yt-dlp");

        let mut cmd = Command::new(&self.binary_path);
        cmd.arg("--skip-download")
            .arg("--print")
            .arg("%(id)s|%(title)s|%(webpage_url)s")
            .arg("--no-warnings")
            .arg("--playlist-items")
            .arg(format!("1-{}", self.options.playlist_limit))
            .arg(series_url)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = {
            let _guard = self.extract_lock.lock().await;
            tokio::time::timeout(self.options.extract_timeout, cmd.output())
                .await
                .map_err(|_| Error::ExtractionTimeout {
                    url: series_url.to_string(),
                    timeout_secs: self.options.extract_timeout.as_secs(),
                })?
                .map_err(|e| Error::ExternalTool(format!("failed to execute yt-dlp: {}", e)))?
        };

        if !output.status.success() {
            tracing::error!(
                url = %series_url,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "yt-dlp extraction failed"
            );
            return Ok(Vec::new());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let episodes: Vec<Episode> = stdout.lines().filter_map(parse_extract_line).collect();

        tracing::info!(url = %series_url, count = episodes.len(), "extraction complete");
        Ok(episodes)
    }

    async fn download(
        &self,
        episodes: &[Episode],
        series_name: &str,
        category: Option<&str>,
        on_progress: ProgressFn<'_>,
    ) -> Result<Vec<DownloadResult>> {
        if episodes.is_empty() {
            return Ok(Vec::new());
        }

        let output_dir = self.output_dir(category);
        tokio::fs::create_dir_all(&output_dir).await?;

        // In subtitles-only mode, skip episodes whose sidecar already exists
        let targets: Vec<&Episode> = if self.subtitles_only {
            episodes
                .iter()
                .filter(|ep| !subtitles::has_subtitle(&output_dir, &ep.title))
                .collect()
        } else {
            episodes.iter().collect()
        };

        if targets.is_empty() {
            tracing::info!(series = %series_name, "all subtitle sidecars present, nothing to do");
            return Ok(Vec::new());
        }

        let by_id: HashMap<&str, &Episode> =
            targets.iter().map(|ep| (ep.id.as_str(), *ep)).collect();
        let urls: Vec<&str> = targets.iter().map(|ep| ep.url.as_str()).collect();

        tracing::info!(
            series = %series_name,
            count = targets.len(),
            dir = %output_dir.display(),
            "starting yt-dlp download"
        );

        let mut child = self
            .download_command(&urls, &output_dir)
            .spawn()
            .map_err(|e| Error::ExternalTool(format!("failed to spawn yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ExternalTool("yt-dlp stdout not captured".to_string()))?;

        // stderr must be drained concurrently: a child blocked on a full
        // stderr pipe never closes stdout, stalling the read loop below
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut tail = String::new();
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tail.len() < STDERR_TAIL_LIMIT {
                        tail.push_str(&line);
                        tail.push('\n');
                    }
                }
            }
            tail
        });

        let mut results: Vec<DownloadResult> = Vec::new();
        let mut completed: usize = 0;
        let mut lines = BufReader::new(stdout).lines();

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(series = %series_name, error = %e, "stdout read failed");
                    break;
                }
            };

            if let Some(marker) = parse_result_line(&line) {
                // A parsed marker means one item finished; the counter
                // advances even when the id lookup fails, so progress
                // values stay monotonic
                completed += 1;
                on_progress(completed as f64);

                let Some(episode) = by_id.get(marker.id.as_str()) else {
                    tracing::warn!(
                        series = %series_name,
                        id = %marker.id,
                        "result marker for unknown episode, skipping"
                    );
                    continue;
                };

                tracing::debug!(
                    series = %series_name,
                    title = %episode.title,
                    path = %marker.file_path.display(),
                    "episode completed"
                );

                // URL and title come from the original candidate so the
                // filter-matched title semantics are preserved
                results.push(DownloadResult {
                    series_name: series_name.to_string(),
                    episode_title: episode.title.clone(),
                    url: episode.url.clone(),
                    episode_number: marker.episode_number.or(episode.episode_number),
                    file_path: marker.file_path,
                    has_subtitles: false,
                    subtitle_format: None,
                });
            } else if let Some(fraction) = parse_progress_line(&line) {
                on_progress(completed as f64 + fraction);
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| Error::ExternalTool(format!("failed to wait for yt-dlp: {}", e)))?;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            // Partial success is preserved: whatever markers were parsed
            // before the failure are still returned
            tracing::error!(
                series = %series_name,
                code = status.code().unwrap_or(-1),
                parsed = results.len(),
                stderr = %stderr_tail.trim_end(),
                "yt-dlp exited with failure"
            );
        }

        // The download may have just produced sidecars; re-probe each result
        for result in &mut results {
            match subtitles::find_subtitle(&output_dir, &result.episode_title) {
                Some((_, format)) => {
                    result.has_subtitles = true;
                    result.subtitle_format = Some(format);
                }
                None => {
                    tracing::warn!(
                        series = %series_name,
                        title = %result.episode_title,
                        "missing subtitle sidecar"
                    );
                }
            }
        }

        Ok(results)
    }
}
