//! Flat-file history backend
//!
//! A single append-mostly record file with a fixed column header:
//! `series_name,episode_name,url,episode_number,subtitles`. Lookups are a
//! full linear scan of the url column; records are appended one row per
//! successful download. A missing file is treated as empty and created with
//! headers on first use.
//!
//! Single-writer-per-process: an internal mutex serializes both appends
//! and lookups from concurrent series tasks; concurrent writers from
//! multiple processes are out of scope.

use super::Tracker;
use crate::config::SeriesConfig;
use crate::error::Result;
use crate::types::{DownloadResult, Episode};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Fixed header row; column order is part of the file format
const HEADER: &str = "series_name,episode_name,url,episode_number,subtitles";

/// Zero-based index of the url column
const URL_COLUMN: usize = 2;

/// History tracker backed by a delimited text file
pub struct FlatFileTracker {
    path: PathBuf,
    /// Serializes file access within the process so a lookup never
    /// observes a torn row from an in-flight append
    file_lock: Mutex<()>,
}

impl FlatFileTracker {
    /// Open the history file, creating it with headers if missing
    pub async fn new(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, format!("{}\n", HEADER)).await?;
            tracing::debug!(path = %path.display(), "created history file");
        }

        Ok(Self {
            path,
            file_lock: Mutex::new(()),
        })
    }

    /// Path of the underlying history file
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl Tracker for FlatFileTracker {
    async fn has_episode(&self, url: &str) -> bool {
        let _guard = self.file_lock.lock().await;
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return false,
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "failed to read history file");
                return false;
            }
        };

        contents
            .lines()
            .skip(1) // header
            .filter_map(|line| {
                let fields = split_record(line);
                fields.get(URL_COLUMN).cloned()
            })
            .any(|recorded| recorded == url)
    }

    async fn record_download(
        &self,
        series: &SeriesConfig,
        episode: &Episode,
        result: &DownloadResult,
    ) -> Result<()> {
        let row = format!(
            "{},{},{},{},{}\n",
            escape_field(&series.name),
            escape_field(&episode.title),
            escape_field(&episode.url),
            result
                .episode_number
                .map(|n| n.to_string())
                .unwrap_or_default(),
            result.has_subtitles,
        );

        let _guard = self.file_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;
        file.write_all(row.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Quote a field when it contains the delimiter, a quote, or a newline
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Split one record line into fields, honoring quoted fields
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
