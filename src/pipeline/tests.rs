use super::*;
use crate::config::{DownloadConfig, HistoryConfig};
use crate::progress::test_support::RecordingProgress;
use crate::types::{DownloadResult, SubtitleFormat};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Episode source backed by canned per-URL responses
#[derive(Default)]
struct MockSource {
    /// Episodes returned by `extract_episodes`, keyed by series URL
    episodes: HashMap<String, Vec<Episode>>,
    /// Series URLs whose extraction fails
    extract_errors: Vec<String>,
    /// Series names whose download fails
    download_errors: Vec<String>,
    /// Episode urls silently dropped by the download (simulates items the
    /// external process never confirmed)
    dropped_urls: Vec<String>,
    /// Episode urls downloaded without a subtitle sidecar
    without_subtitles: Vec<String>,
    download_calls: AtomicUsize,
}

impl MockSource {
    fn with_episodes(url: &str, episodes: Vec<Episode>) -> Self {
        let mut source = Self::default();
        source.episodes.insert(url.to_string(), episodes);
        source
    }

    fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EpisodeSource for MockSource {
    async fn extract_episodes(&self, series_url: &str) -> Result<Vec<Episode>> {
        if self.extract_errors.iter().any(|u| u == series_url) {
            return Err(crate::Error::ExternalTool(
                "extraction process failed".to_string(),
            ));
        }
        Ok(self.episodes.get(series_url).cloned().unwrap_or_default())
    }

    async fn download(
        &self,
        episodes: &[Episode],
        series_name: &str,
        _category: Option<&str>,
        on_progress: crate::ytdlp::ProgressFn<'_>,
    ) -> Result<Vec<DownloadResult>> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if self.download_errors.iter().any(|n| n == series_name) {
            return Err(crate::Error::ExternalTool(
                "download process failed".to_string(),
            ));
        }

        let mut results = Vec::new();
        let mut completed = 0usize;
        for episode in episodes {
            if self.dropped_urls.iter().any(|u| u == &episode.url) {
                continue;
            }
            on_progress(completed as f64 + 0.5);
            completed += 1;
            on_progress(completed as f64);
            let has_subtitles = !self.without_subtitles.iter().any(|u| u == &episode.url);
            results.push(DownloadResult {
                series_name: series_name.to_string(),
                episode_title: episode.title.clone(),
                url: episode.url.clone(),
                episode_number: episode.episode_number,
                file_path: PathBuf::from(format!("/tmp/{}.mp4", episode.id)),
                has_subtitles,
                subtitle_format: has_subtitles.then_some(SubtitleFormat::Vtt),
            });
        }
        Ok(results)
    }
}

/// In-memory tracker with optional persistence failures
#[derive(Default)]
struct MockTracker {
    seen: Mutex<Vec<String>>,
    fail_records: bool,
    record_calls: AtomicUsize,
}

impl MockTracker {
    fn with_history(urls: &[&str]) -> Self {
        Self {
            seen: Mutex::new(urls.iter().map(|u| u.to_string()).collect()),
            ..Default::default()
        }
    }

    fn recorded(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tracker for MockTracker {
    async fn has_episode(&self, url: &str) -> bool {
        self.seen.lock().unwrap().iter().any(|u| u == url)
    }

    async fn record_download(
        &self,
        _series: &SeriesConfig,
        episode: &Episode,
        _result: &DownloadResult,
    ) -> Result<()> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_records {
            return Err(crate::Error::Other("history store unavailable".to_string()));
        }
        self.seen.lock().unwrap().push(episode.url.clone());
        Ok(())
    }
}

fn series(name: &str, url: &str) -> SeriesConfig {
    SeriesConfig::new(name, url)
}

fn episode(id: &str, title: &str) -> Episode {
    Episode::new(id, title, format!("https://tver.jp/episodes/{id}"))
}

fn config_with(series: Vec<SeriesConfig>) -> Config {
    Config {
        series,
        download: DownloadConfig {
            download_dir: PathBuf::from("/tmp/tver-dl-test"),
            ..Default::default()
        },
        history: HistoryConfig::default(),
        ytdlp: Default::default(),
    }
}

fn pipeline(
    config: Config,
    source: Arc<MockSource>,
    tracker: Arc<MockTracker>,
) -> TverDownloader {
    TverDownloader::from_parts(config, source, tracker).unwrap()
}

fn statuses_for(progress: &RecordingProgress, name: &str) -> Vec<SeriesStatus> {
    progress
        .statuses
        .lock()
        .unwrap()
        .iter()
        .filter(|(n, _)| n == name)
        .map(|(_, s)| s.clone())
        .collect()
}

#[tokio::test]
async fn test_run_downloads_and_records_new_episodes() {
    let url = "https://tver.jp/series/srtest001";
    let source = Arc::new(MockSource::with_episodes(
        url,
        vec![episode("ep1", "第1話"), episode("ep2", "第2話")],
    ));
    let tracker = Arc::new(MockTracker::default());
    let dl = pipeline(
        config_with(vec![series("Example", url)]),
        Arc::clone(&source),
        Arc::clone(&tracker),
    );

    let summary = dl.run().await.unwrap();

    assert_eq!(summary.series_processed, 1);
    assert_eq!(summary.episodes_downloaded, 2);
    let report = &summary.reports["Example"];
    assert_eq!(report.downloaded, vec!["第1話", "第2話"]);
    assert!(report.missing_subtitles.is_empty());
    assert_eq!(tracker.recorded().len(), 2);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let url = "https://tver.jp/series/srtest001";
    let source = Arc::new(MockSource::with_episodes(url, vec![episode("ep1", "第1話")]));
    let tracker = Arc::new(MockTracker::default());
    let dl = pipeline(
        config_with(vec![series("Example", url)]),
        Arc::clone(&source),
        Arc::clone(&tracker),
    );

    let first = dl.run().await.unwrap();
    assert_eq!(first.episodes_downloaded, 1);
    assert_eq!(source.download_calls(), 1);

    let second = dl.run().await.unwrap();
    assert_eq!(second.episodes_downloaded, 0);
    // Dedup happens before the executor is invoked at all
    assert_eq!(source.download_calls(), 1);
}

#[tokio::test]
async fn test_series_failure_does_not_affect_siblings() {
    let good_url = "https://tver.jp/series/srgood";
    let bad_url = "https://tver.jp/series/srbad";
    let mut source = MockSource::with_episodes(good_url, vec![episode("ep1", "第1話")]);
    source
        .episodes
        .insert(bad_url.to_string(), vec![episode("ep9", "第9話")]);
    source.download_errors.push("Broken".to_string());
    let source = Arc::new(source);
    let tracker = Arc::new(MockTracker::default());
    let progress = Arc::new(RecordingProgress::default());

    let dl = pipeline(
        config_with(vec![series("Broken", bad_url), series("Working", good_url)]),
        Arc::clone(&source),
        Arc::clone(&tracker),
    )
    .with_progress(Arc::clone(&progress) as Arc<dyn ProgressSink>);

    let summary = dl.run().await.unwrap();

    assert_eq!(summary.series_processed, 2);
    assert_eq!(summary.episodes_downloaded, 1);
    assert_eq!(summary.reports["Working"].downloaded, vec!["第1話"]);
    assert!(summary.reports["Broken"].downloaded.is_empty());

    let broken = statuses_for(&progress, "Broken");
    assert!(matches!(broken.last(), Some(SeriesStatus::Failed { .. })));
    let working = statuses_for(&progress, "Working");
    assert_eq!(
        working.last(),
        Some(&SeriesStatus::Completed { downloaded: 1 })
    );
}

#[tokio::test]
async fn test_extraction_failure_is_treated_as_no_data() {
    let url = "https://tver.jp/series/srflaky";
    let mut source = MockSource::default();
    source.extract_errors.push(url.to_string());
    let source = Arc::new(source);
    let progress = Arc::new(RecordingProgress::default());

    let dl = pipeline(
        config_with(vec![series("Flaky", url)]),
        Arc::clone(&source),
        Arc::new(MockTracker::default()),
    )
    .with_progress(Arc::clone(&progress) as Arc<dyn ProgressSink>);

    let summary = dl.run().await.unwrap();

    assert_eq!(summary.episodes_downloaded, 0);
    let statuses = statuses_for(&progress, "Flaky");
    assert_eq!(statuses.last(), Some(&SeriesStatus::NoEpisodes));
}

#[tokio::test]
async fn test_filter_and_dedup_statuses() {
    let filtered_url = "https://tver.jp/series/srfiltered";
    let seen_url = "https://tver.jp/series/srseen";
    let mut source = MockSource::with_episodes(filtered_url, vec![episode("ep1", "第1話 予告")]);
    let seen_episode = episode("ep2", "第2話");
    source
        .episodes
        .insert(seen_url.to_string(), vec![seen_episode.clone()]);
    let source = Arc::new(source);
    let tracker = Arc::new(MockTracker::with_history(&[&seen_episode.url]));
    let progress = Arc::new(RecordingProgress::default());

    let mut filtered = series("Filtered", filtered_url);
    filtered.exclude_patterns.push("予告".to_string());

    let dl = pipeline(
        config_with(vec![filtered, series("Seen", seen_url)]),
        Arc::clone(&source),
        Arc::clone(&tracker),
    )
    .with_progress(Arc::clone(&progress) as Arc<dyn ProgressSink>);

    let summary = dl.run().await.unwrap();

    assert_eq!(summary.episodes_downloaded, 0);
    assert_eq!(source.download_calls(), 0);
    assert_eq!(
        statuses_for(&progress, "Filtered").last(),
        Some(&SeriesStatus::NoMatches)
    );
    assert_eq!(
        statuses_for(&progress, "Seen").last(),
        Some(&SeriesStatus::UpToDate)
    );
}

#[tokio::test]
async fn test_partial_results_are_still_recorded() {
    let url = "https://tver.jp/series/srpartial";
    let ep1 = episode("ep1", "第1話");
    let ep2 = episode("ep2", "第2話");
    let mut source = MockSource::with_episodes(url, vec![ep1.clone(), ep2.clone()]);
    source.dropped_urls.push(ep2.url.clone());
    let source = Arc::new(source);
    let tracker = Arc::new(MockTracker::default());

    let dl = pipeline(
        config_with(vec![series("Partial", url)]),
        Arc::clone(&source),
        Arc::clone(&tracker),
    );

    let summary = dl.run().await.unwrap();

    // Only the confirmed item is counted and recorded; the dropped one
    // stays eligible for the next run
    assert_eq!(summary.episodes_downloaded, 1);
    assert_eq!(tracker.recorded(), vec![ep1.url.clone()]);
    assert!(!tracker.has_episode(&ep2.url).await);
}

#[tokio::test]
async fn test_record_failure_does_not_abort_the_series() {
    let url = "https://tver.jp/series/srnodb";
    let source = Arc::new(MockSource::with_episodes(
        url,
        vec![episode("ep1", "第1話"), episode("ep2", "第2話")],
    ));
    let tracker = Arc::new(MockTracker {
        fail_records: true,
        ..Default::default()
    });
    let progress = Arc::new(RecordingProgress::default());

    let dl = pipeline(
        config_with(vec![series("NoDb", url)]),
        Arc::clone(&source),
        Arc::clone(&tracker),
    )
    .with_progress(Arc::clone(&progress) as Arc<dyn ProgressSink>);

    let summary = dl.run().await.unwrap();

    assert_eq!(summary.episodes_downloaded, 2);
    assert_eq!(tracker.record_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        statuses_for(&progress, "NoDb").last(),
        Some(&SeriesStatus::Completed { downloaded: 2 })
    );
}

#[tokio::test]
async fn test_progress_values_are_monotonic() {
    let url = "https://tver.jp/series/srprogress";
    let source = Arc::new(MockSource::with_episodes(
        url,
        vec![episode("ep1", "第1話"), episode("ep2", "第2話")],
    ));
    let progress = Arc::new(RecordingProgress::default());

    let dl = pipeline(
        config_with(vec![series("Progress", url)]),
        Arc::clone(&source),
        Arc::new(MockTracker::default()),
    )
    .with_progress(Arc::clone(&progress) as Arc<dyn ProgressSink>);

    dl.run().await.unwrap();

    let values: Vec<(f64, usize)> = progress
        .values
        .lock()
        .unwrap()
        .iter()
        .map(|(_, completed, total)| (*completed, *total))
        .collect();

    assert_eq!(
        values,
        vec![(0.0, 2), (0.5, 2), (1.0, 2), (1.5, 2), (2.0, 2)]
    );
}

#[tokio::test]
async fn test_missing_subtitles_are_reported() {
    let url = "https://tver.jp/series/srnosubs";
    let ep = episode("ep1", "第1話");
    let mut source = MockSource::with_episodes(url, vec![ep.clone()]);
    source.without_subtitles.push(ep.url.clone());
    let source = Arc::new(source);

    let dl = pipeline(
        config_with(vec![series("NoSubs", url)]),
        Arc::clone(&source),
        Arc::new(MockTracker::default()),
    );

    let summary = dl.run().await.unwrap();
    assert_eq!(summary.reports["NoSubs"].missing_subtitles, vec!["第1話"]);
}

#[tokio::test]
async fn test_disabled_series_is_skipped() {
    let url = "https://tver.jp/series/sroff";
    let source = Arc::new(MockSource::with_episodes(url, vec![episode("ep1", "第1話")]));
    let mut off = series("Off", url);
    off.enabled = false;

    let dl = pipeline(
        config_with(vec![off]),
        Arc::clone(&source),
        Arc::new(MockTracker::default()),
    );

    let summary = dl.run().await.unwrap();
    assert_eq!(summary.series_processed, 0);
    assert!(summary.reports.is_empty());
    assert_eq!(source.download_calls(), 0);
}

#[tokio::test]
async fn test_no_enabled_series_yields_empty_summary() {
    let dl = pipeline(
        config_with(Vec::new()),
        Arc::new(MockSource::default()),
        Arc::new(MockTracker::default()),
    );
    let summary = dl.run().await.unwrap();
    assert_eq!(summary.series_processed, 0);
    assert_eq!(summary.episodes_downloaded, 0);
}
