//! TVer platform API client
//!
//! Thin collaborator over the platform's JSON API: an anonymous session
//! bootstrap yielding opaque platform credentials, a season listing per
//! series, and an episode listing per season. The core only requires the
//! stable episode id, a human-readable title and the optional episode
//! number; everything else is passed through as free-form text.
//!
//! Unlike the yt-dlp extractor, this source knows which season an episode
//! belongs to, which is what makes `target_seasons` filtering effective.
//!
//! API and HTTP failures are transient collaborator failures: logged and
//! treated as "no data", never fatal.

use crate::Result;
use crate::types::Episode;
use serde::Deserialize;
use tokio::sync::OnceCell;

const DEFAULT_PLATFORM_BASE: &str = "https://platform-api.tver.jp";
const DEFAULT_SERVICE_BASE: &str = "https://service-api.tver.jp";
const EPISODE_PAGE_BASE: &str = "https://tver.jp/episodes/";

/// Opaque platform credentials returned by the session bootstrap
#[derive(Debug, Clone, Deserialize)]
struct PlatformSession {
    platform_uid: String,
    platform_token: String,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    result: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct ContentList {
    #[serde(default)]
    contents: Vec<ContentItem>,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    content: ContentBody,
}

#[derive(Debug, Default, Deserialize)]
struct ContentBody {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "seriesTitle", default)]
    series_title: Option<String>,
    #[serde(rename = "broadcastDateLabel", default)]
    broadcast_date_label: Option<String>,
    #[serde(default)]
    no: Option<i32>,
}

/// A season of a series as listed by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Season {
    /// Platform-assigned season id
    pub id: String,
    /// Season display name (e.g., "本編", "特別編")
    pub name: String,
}

/// Client for the TVer platform API
pub struct TverClient {
    http: reqwest::Client,
    platform_base: String,
    service_base: String,
    session: OnceCell<Option<PlatformSession>>,
}

impl TverClient {
    /// Create a client against the production API endpoints
    pub fn new() -> Self {
        Self::with_endpoints(DEFAULT_PLATFORM_BASE, DEFAULT_SERVICE_BASE)
    }

    /// Create a client against explicit API base URLs (used by tests)
    pub fn with_endpoints(platform_base: impl Into<String>, service_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            platform_base: platform_base.into(),
            service_base: service_base.into(),
            session: OnceCell::new(),
        }
    }

    fn platform_headers(&self) -> reqwest::header::HeaderMap {
        use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER};

        let mut headers = HeaderMap::new();
        headers.insert("x-tver-platform-type", HeaderValue::from_static("web"));
        headers.insert(ORIGIN, HeaderValue::from_static("https://tver.jp"));
        headers.insert(REFERER, HeaderValue::from_static("https://tver.jp/"));
        headers
    }

    /// Bootstrap an anonymous platform session, once, caching the outcome
    ///
    /// Returns `None` when the bootstrap fails; episode listing calls then
    /// proceed without credentials and let the API decide.
    async fn session(&self) -> Option<&PlatformSession> {
        self.session
            .get_or_init(|| async {
                let url = format!(
                    "{}/v2/api/platform_users/browser/create",
                    self.platform_base
                );
                let response = self
                    .http
                    .post(&url)
                    .headers(self.platform_headers())
                    .form(&[("device_type", "pc")])
                    .send()
                    .await;

                match response {
                    Ok(resp) => match resp.json::<ApiEnvelope<PlatformSession>>().await {
                        Ok(envelope) => {
                            if envelope.result.is_none() {
                                tracing::warn!("platform session bootstrap returned no credentials");
                            }
                            envelope.result
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to decode platform session");
                            None
                        }
                    },
                    Err(e) => {
                        tracing::error!(error = %e, "platform session bootstrap failed");
                        None
                    }
                }
            })
            .await
            .as_ref()
    }

    /// List the seasons of a series
    pub async fn series_seasons(&self, series_id: &str) -> Result<Vec<Season>> {
        let url = format!(
            "{}/api/v1/callSeriesSeasons/{}",
            self.service_base,
            urlencoding::encode(series_id)
        );

        let envelope: ApiEnvelope<ContentList> = self
            .http
            .get(&url)
            .headers(self.platform_headers())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let seasons = envelope
            .result
            .unwrap_or_default()
            .contents
            .into_iter()
            .filter(|item| item.kind == "season")
            .filter_map(|item| {
                Some(Season {
                    id: item.content.id?,
                    name: item.content.title.unwrap_or_default(),
                })
            })
            .collect();

        Ok(seasons)
    }

    /// List the episodes of a season
    pub async fn season_episodes(&self, season: &Season) -> Result<Vec<Episode>> {
        let mut url = format!(
            "{}/service/api/v1/callSeasonEpisodes/{}",
            self.platform_base,
            urlencoding::encode(&season.id)
        );
        if let Some(session) = self.session().await {
            url.push_str(&format!(
                "?platform_uid={}&platform_token={}",
                urlencoding::encode(&session.platform_uid),
                urlencoding::encode(&session.platform_token)
            ));
        }

        let envelope: ApiEnvelope<ContentList> = self
            .http
            .get(&url)
            .headers(self.platform_headers())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let episodes = envelope
            .result
            .unwrap_or_default()
            .contents
            .into_iter()
            .filter(|item| item.kind == "episode")
            .filter_map(|item| {
                let body = item.content;
                let id = body.id?;
                let episode_title = body.title.unwrap_or_default();
                let series_title = body.series_title.unwrap_or_default();
                // The full title is what the platform-marker filters match
                let title = format!("{} {}", series_title, episode_title)
                    .trim()
                    .to_string();

                Some(Episode {
                    url: format!("{}{}", EPISODE_PAGE_BASE, id),
                    id,
                    title,
                    season_name: Some(season.name.clone()),
                    episode_number: body.no,
                    broadcast_date: body.broadcast_date_label,
                })
            })
            .collect();

        Ok(episodes)
    }

    /// List all episodes of a series across its seasons
    ///
    /// Per-season failures are logged and skipped; a series with no
    /// reachable seasons yields an empty list, not an error.
    pub async fn series_episodes(&self, series_id: &str) -> Vec<Episode> {
        let seasons = match self.series_seasons(series_id).await {
            Ok(seasons) => seasons,
            Err(e) => {
                tracing::error!(series_id = %series_id, error = %e, "season listing failed");
                return Vec::new();
            }
        };

        if seasons.is_empty() {
            tracing::warn!(series_id = %series_id, "no seasons found for series");
            return Vec::new();
        }

        let mut episodes = Vec::new();
        for season in &seasons {
            match self.season_episodes(season).await {
                Ok(mut eps) => episodes.append(&mut eps),
                Err(e) => {
                    tracing::error!(
                        series_id = %series_id,
                        season = %season.name,
                        error = %e,
                        "episode listing failed"
                    );
                }
            }
        }

        tracing::info!(series_id = %series_id, count = episodes.len(), "platform API listing complete");
        episodes
    }
}

impl Default for TverClient {
    fn default() -> Self {
        Self::new()
    }
}
