//! Episode filtering
//!
//! Pure decision function deciding whether a candidate episode should be
//! downloaded for a given series. No I/O besides diagnostic tracing.
//!
//! Decision order (first match wins):
//! 1. If `target_seasons` is non-empty, include iff the episode's season is
//!    a member of that set. This short-circuits all pattern checks.
//! 2. Else if no patterns are configured at all, include unconditionally.
//! 3. Else if the title contains any exclude pattern, exclude.
//! 4. Else if include patterns are configured, include iff at least one
//!    matches.
//! 5. Else include.
//!
//! Matching is case-sensitive substring containment over Unicode text, not
//! regex. No case folding or half/full-width normalization is performed;
//! patterns like "第" and "＃" rely on exact codepoints from the platform.

use crate::config::SeriesConfig;
use crate::types::Episode;
use tracing::debug;

/// Decide whether an episode should be downloaded for a series
pub fn should_download(episode: &Episode, series: &SeriesConfig) -> bool {
    let title = episode.title.as_str();

    // Season targeting strictly overrides pattern filtering
    if !series.target_seasons.is_empty() {
        let season = episode.season_name.as_deref().unwrap_or("");
        let matches = series.target_seasons.iter().any(|s| s == season);
        debug!(
            series = %series.name,
            title = %title,
            season = %season,
            matches,
            "season targeting applied"
        );
        return matches;
    }

    if series.include_patterns.is_empty() && series.exclude_patterns.is_empty() {
        debug!(series = %series.name, title = %title, "no filters configured, including");
        return true;
    }

    // Any exclude match rejects, even if an include pattern also matches
    for pattern in &series.exclude_patterns {
        if title.contains(pattern.as_str()) {
            debug!(
                series = %series.name,
                title = %title,
                pattern = %pattern,
                "excluded by pattern"
            );
            return false;
        }
    }

    if !series.include_patterns.is_empty() {
        for pattern in &series.include_patterns {
            if title.contains(pattern.as_str()) {
                debug!(
                    series = %series.name,
                    title = %title,
                    pattern = %pattern,
                    "included by pattern"
                );
                return true;
            }
        }
        debug!(series = %series.name, title = %title, "no include pattern matched");
        return false;
    }

    // Only exclude patterns configured and none matched
    debug!(series = %series.name, title = %title, "passed exclude filters");
    true
}
