//! Subtitle sidecar presence check
//!
//! Stateless filesystem probe for subtitle files co-located with downloaded
//! videos. A sidecar "belongs" to an episode when its file stem starts with
//! the episode title and its extension is one of the known subtitle formats.
//!
//! The title is treated as an opaque literal, never as a glob pattern, so
//! titles containing `*`, `?`, `[` or `]` match their own sidecars exactly.

use crate::types::SubtitleFormat;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Find a subtitle sidecar for the given title under `root`, recursively
///
/// Returns the first matching sidecar and its format, probing extensions in
/// the order of [`SubtitleFormat::ALL`]. Returns `None` when the directory
/// does not exist or nothing matches.
pub fn find_subtitle(root: &Path, title: &str) -> Option<(PathBuf, SubtitleFormat)> {
    if title.is_empty() {
        return None;
    }

    let mut found: Option<(PathBuf, SubtitleFormat)> = None;

    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(format) = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(SubtitleFormat::from_extension)
        else {
            continue;
        };
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !stem.starts_with(title) {
            continue;
        }

        // Prefer the earliest format in probe order when several exist
        match found {
            Some((_, existing)) if probe_rank(existing) <= probe_rank(format) => {}
            _ => found = Some((path.to_path_buf(), format)),
        }
    }

    found
}

/// Whether any subtitle sidecar exists for the title under `root`
pub fn has_subtitle(root: &Path, title: &str) -> bool {
    find_subtitle(root, title).is_some()
}

fn probe_rank(format: SubtitleFormat) -> usize {
    SubtitleFormat::ALL
        .iter()
        .position(|f| *f == format)
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_missing_directory_is_empty() {
        assert!(!has_subtitle(Path::new("/nonexistent/tver-dl-test"), "第1話"));
    }

    #[test]
    fn test_finds_sidecar_by_title_prefix() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "第1話 出会い.ja.vtt");
        touch(tmp.path(), "第1話 出会い.mp4");

        let (path, format) = find_subtitle(tmp.path(), "第1話 出会い").unwrap();
        assert_eq!(format, SubtitleFormat::Vtt);
        assert!(path.ends_with("第1話 出会い.ja.vtt"));
        assert!(!has_subtitle(tmp.path(), "第2話"));
    }

    #[test]
    fn test_finds_sidecar_in_subdirectory() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("テスト番組");
        fs::create_dir(&nested).unwrap();
        touch(&nested, "第3話.srt");

        let (_, format) = find_subtitle(tmp.path(), "第3話").unwrap();
        assert_eq!(format, SubtitleFormat::Srt);
    }

    #[test]
    fn test_glob_metacharacters_in_title_are_literal() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "第1話 [新]何が出る?.ja.vtt");

        assert!(has_subtitle(tmp.path(), "第1話 [新]何が出る?"));
        // A literal bracket pattern must not behave as a character class
        assert!(!has_subtitle(tmp.path(), "第1話 [旧]何が出る?"));
    }

    #[test]
    fn test_probe_order_prefers_vtt() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "第2話.ass");
        touch(tmp.path(), "第2話.vtt");

        let (_, format) = find_subtitle(tmp.path(), "第2話").unwrap();
        assert_eq!(format, SubtitleFormat::Vtt);
    }

    #[test]
    fn test_non_subtitle_extensions_ignored() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "第4話.mp4");
        touch(tmp.path(), "第4話.info.json");

        assert!(!has_subtitle(tmp.path(), "第4話"));
    }
}
