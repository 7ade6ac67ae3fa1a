//! Parser for yt-dlp output lines
//!
//! yt-dlp speaks a line-oriented text protocol. Three kinds of lines are
//! recognized:
//! - extraction records: `id|title|url`, one per playlist item
//! - progress lines: `[download]  42.3% of ...`
//! - result markers: `RESULT:<id>|<episode_number>|<filepath>|<title>`,
//!   printed after an item has fully completed (print-after-move hook)
//!
//! All parsers are total: malformed input yields `None` and never affects
//! sibling lines.

use crate::types::Episode;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Field delimiter used by both extraction records and result markers.
/// Not expected to appear in episode ids or URLs; titles are placed last
/// (or split with a bounded limit) so embedded delimiters survive.
pub const FIELD_DELIMITER: char = '|';

/// Prefix of result marker lines
pub const RESULT_PREFIX: &str = "RESULT:";

/// Sentinel yt-dlp prints for absent template fields
const NA_SENTINEL: &str = "NA";

#[allow(clippy::expect_used)] // pattern is a checked constant
static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[download\]\s+(\d{1,3}(?:\.\d+)?)%").expect("progress regex is valid")
});

/// Parsed result marker for one completed item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultMarker {
    /// Platform episode id, used to look up the original candidate
    pub id: String,
    /// Episode number; the `NA` sentinel and non-numeric values become `None`
    pub episode_number: Option<i32>,
    /// Final path of the downloaded file, after move
    pub file_path: PathBuf,
    /// Title as rendered by yt-dlp (informational; the candidate's title
    /// is authoritative for filtering and sidecar matching)
    pub title: String,
}

/// Parse one extraction record line (`id|title|url`)
///
/// Returns `None` for blank or malformed lines (missing delimiter, fewer
/// than three fields, empty id or url). The title is the middle field; the
/// split is bounded so a delimiter inside the URL cannot shift fields.
pub fn parse_extract_line(line: &str) -> Option<Episode> {
    let line = line.trim();
    if line.is_empty() || !line.contains(FIELD_DELIMITER) {
        return None;
    }

    let mut parts = line.splitn(3, FIELD_DELIMITER);
    let id = parts.next()?.trim();
    let title = parts.next()?.trim();
    let url = parts.next()?.trim();

    if id.is_empty() || url.is_empty() {
        return None;
    }

    Some(Episode::new(id, title, url))
}

/// Parse a progress line, returning the in-item fraction (0.0 to 1.0)
pub fn parse_progress_line(line: &str) -> Option<f64> {
    let captures = PROGRESS_RE.captures(line)?;
    let percent: f64 = captures.get(1)?.as_str().parse().ok()?;
    Some(percent / 100.0)
}

/// Parse a result marker line
///
/// Format: `RESULT:<id>|<episode_number>|<filepath>|<title>`. The title is
/// the final field and may itself contain the delimiter. Malformed markers
/// yield `None`.
pub fn parse_result_line(line: &str) -> Option<ResultMarker> {
    let payload = line.trim().strip_prefix(RESULT_PREFIX)?;

    let mut parts = payload.splitn(4, FIELD_DELIMITER);
    let id = parts.next()?.trim();
    let episode_number = parts.next()?.trim();
    let file_path = parts.next()?.trim();
    let title = parts.next()?.trim();

    if id.is_empty() || file_path.is_empty() {
        return None;
    }

    let episode_number = if episode_number == NA_SENTINEL {
        None
    } else {
        episode_number.parse::<i32>().ok()
    };

    Some(ResultMarker {
        id: id.to_string(),
        episode_number,
        file_path: PathBuf::from(file_path),
        title: title.to_string(),
    })
}
