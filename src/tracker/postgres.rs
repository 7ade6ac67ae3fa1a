//! PostgreSQL history backend
//!
//! Records downloads across four schema regions (series, episodes,
//! downloads, subtitles), each keyed by a normalized platform id and
//! upserted inside one transaction. A lookup joins downloads to episodes on
//! URL, filtered to `status = 'downloaded'`.
//!
//! Consistency posture: lookup failures degrade to "not downloaded" (a
//! redundant download is acceptable, an aborted run is not); record
//! failures roll the transaction back and surface an error the pipeline
//! logs and swallows. Concurrent series tasks rely on the store's own
//! transaction isolation, not application-level locking.

use super::Tracker;
use crate::config::SeriesConfig;
use crate::error::{DatabaseError, Error, Result};
use crate::types::{DownloadResult, Episode};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Prefix of synthetic episode ids for URLs without a recognizable id
/// path segment. Derived from the URL tail: deterministic but weak, since
/// distinct episodes with identical URL tails silently merge history.
const SYNTHETIC_ID_PREFIX: &str = "unknown_";

/// Number of trailing URL characters used for synthetic ids
const SYNTHETIC_ID_TAIL: usize = 10;

/// History tracker backed by PostgreSQL
pub struct PostgresTracker {
    pool: PgPool,
    host_label: String,
}

impl PostgresTracker {
    /// Create a tracker for the given connection string
    ///
    /// Connections are established lazily per call; an unreachable store at
    /// startup is a transient failure, not a fatal one.
    pub fn connect(database_url: &str, host_label: String) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "failed to parse connection string: {}",
                    e
                )))
            })?;

        Ok(Self { pool, host_label })
    }

    /// Create the expected schema regions when they do not exist yet
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await.map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "failed to create history schema: {}",
                    e
                )))
            })?;
        }
        Ok(())
    }
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS series (
        id BIGSERIAL PRIMARY KEY,
        tver_series_id TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        url TEXT NOT NULL,
        has_subtitles BOOLEAN NOT NULL DEFAULT FALSE,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS episodes (
        id BIGSERIAL PRIMARY KEY,
        series_id BIGINT NOT NULL REFERENCES series(id),
        tver_episode_id TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        episode_number INTEGER,
        episode_url TEXT NOT NULL,
        subtitles_checked_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS downloads (
        id BIGSERIAL PRIMARY KEY,
        episode_id BIGINT NOT NULL UNIQUE REFERENCES episodes(id),
        status TEXT NOT NULL,
        downloaded_at TIMESTAMPTZ,
        file_path TEXT,
        file_size_bytes BIGINT NOT NULL DEFAULT 0,
        downloader_host TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS subtitles (
        id BIGSERIAL PRIMARY KEY,
        episode_id BIGINT NOT NULL UNIQUE REFERENCES episodes(id),
        status TEXT NOT NULL,
        checked_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        downloaded_at TIMESTAMPTZ,
        subtitle_format TEXT,
        series_name TEXT,
        episode_title TEXT
    )
    "#,
];

/// Extract the platform series id: the last path segment of the series URL
fn series_id_from_url(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
        .to_string()
}

/// Extract the platform episode id from an episode URL
///
/// URLs with an `/episodes/` path segment use their last segment; anything
/// else gets a synthetic fallback id derived from the URL tail.
fn episode_id_from_url(url: &str) -> String {
    if url.contains("/episodes/") {
        return series_id_from_url(url);
    }

    let tail_start = url
        .char_indices()
        .rev()
        .nth(SYNTHETIC_ID_TAIL - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    format!("{}{}", SYNTHETIC_ID_PREFIX, &url[tail_start..])
}

#[async_trait]
impl Tracker for PostgresTracker {
    async fn has_episode(&self, url: &str) -> bool {
        let query = r#"
            SELECT 1 FROM downloads d
            JOIN episodes e ON d.episode_id = e.id
            WHERE e.episode_url = $1 AND d.status = 'downloaded'
        "#;

        match sqlx::query_scalar::<_, i32>(query)
            .bind(url)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(row) => row.is_some(),
            Err(e) => {
                tracing::error!(url = %url, error = %e, "history lookup failed");
                false
            }
        }
    }

    async fn record_download(
        &self,
        series: &SeriesConfig,
        episode: &Episode,
        result: &DownloadResult,
    ) -> Result<()> {
        let file_size = match tokio::fs::metadata(&result.file_path).await {
            Ok(meta) => meta.len() as i64,
            Err(_) => 0,
        };

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "failed to begin transaction: {}",
                e
            )))
        })?;

        let series_row_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO series (tver_series_id, name, url, has_subtitles, updated_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (tver_series_id) DO UPDATE
            SET name = EXCLUDED.name,
                has_subtitles = series.has_subtitles OR EXCLUDED.has_subtitles,
                updated_at = now()
            RETURNING id
            "#,
        )
        .bind(series_id_from_url(&series.url))
        .bind(&series.name)
        .bind(&series.url)
        .bind(result.has_subtitles)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "failed to upsert series: {}",
                e
            )))
        })?;

        let episode_row_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO episodes (series_id, tver_episode_id, title, episode_number, episode_url)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (tver_episode_id) DO UPDATE
            SET title = EXCLUDED.title
            RETURNING id
            "#,
        )
        .bind(series_row_id)
        .bind(episode_id_from_url(&episode.url))
        .bind(&episode.title)
        .bind(result.episode_number)
        .bind(&episode.url)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "failed to upsert episode: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            INSERT INTO downloads (
                episode_id, status, downloaded_at, file_path,
                file_size_bytes, downloader_host
            )
            VALUES ($1, 'downloaded', now(), $2, $3, $4)
            ON CONFLICT (episode_id) DO UPDATE
            SET status = 'downloaded',
                downloaded_at = now(),
                file_path = EXCLUDED.file_path,
                file_size_bytes = EXCLUDED.file_size_bytes,
                downloader_host = EXCLUDED.downloader_host
            "#,
        )
        .bind(episode_row_id)
        .bind(result.file_path.to_string_lossy().into_owned())
        .bind(file_size)
        .bind(&self.host_label)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "failed to upsert download: {}",
                e
            )))
        })?;

        let subtitle_status = if result.has_subtitles {
            "downloaded"
        } else {
            "missing"
        };

        // COALESCE keeps an existing downloaded_at: a later missing-subtitle
        // pass must not erase proof of a former success
        sqlx::query(
            r#"
            INSERT INTO subtitles (
                episode_id, status, checked_at, downloaded_at,
                subtitle_format, series_name, episode_title
            )
            VALUES ($1, $2, now(), CASE WHEN $3 THEN now() END, $4, $5, $6)
            ON CONFLICT (episode_id) DO UPDATE
            SET status = EXCLUDED.status,
                checked_at = now(),
                downloaded_at = COALESCE(EXCLUDED.downloaded_at, subtitles.downloaded_at),
                subtitle_format = COALESCE(EXCLUDED.subtitle_format, subtitles.subtitle_format),
                series_name = EXCLUDED.series_name,
                episode_title = EXCLUDED.episode_title
            "#,
        )
        .bind(episode_row_id)
        .bind(subtitle_status)
        .bind(result.has_subtitles)
        .bind(result.subtitle_format.map(|f| f.extension().to_string()))
        .bind(&series.name)
        .bind(&episode.title)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "failed to upsert subtitle record: {}",
                e
            )))
        })?;

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "failed to commit history transaction: {}",
                e
            )))
        })?;

        Ok(())
    }
}
