//! Choosing which sheet rows still need scraping.

use tracing::{debug, info};

/// An answer URL and the 1-based sheet row it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRow {
    pub row: u32,
    pub url: String,
}

/// Move a range that starts on the header row down to the first data row.
pub fn normalize_range(range: &str) -> String {
    let trimmed = range.trim();
    let column: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let rest = &trimmed[column.len()..];
    match rest.strip_prefix('1') {
        Some(tail) if !tail.starts_with(|c: char| c.is_ascii_digit()) => {
            format!("{column}2{tail}")
        }
        _ => trimmed.to_string(),
    }
}

/// First row number named in an A1 range, defaulting to 2.
pub fn start_row(range: &str) -> u32 {
    let digits: String = range
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok().filter(|n| *n > 0).unwrap_or(2)
}

/// Whether a cell looks like an answer URL on the scraped site.
pub fn is_target_url(url: &str, site_host: &str) -> bool {
    url.to_ascii_lowercase().contains(&site_host.to_ascii_lowercase())
}

fn is_processed(flag: Option<&String>) -> bool {
    flag.is_some_and(|f| f.trim().eq_ignore_ascii_case("TRUE"))
}

/// Rows with a URL and no processed flag, capped at `max` (0 means no cap).
///
/// `urls[i]` and `flags[i]` both describe row `start_row + i`; a missing
/// flag counts as unprocessed. URLs are trimmed and stripped of `@`.
pub fn select_pending(start_row: u32, urls: &[String], flags: &[String], max: usize) -> Vec<UrlRow> {
    let mut pending = Vec::new();
    let mut blank = 0usize;
    let mut done = 0usize;

    for (offset, cell) in urls.iter().enumerate() {
        if max > 0 && pending.len() >= max {
            debug!(target: "sheets.rows", max, "pending cap reached");
            break;
        }
        let url = cell.trim().replace('@', "");
        if url.is_empty() {
            blank += 1;
            continue;
        }
        if is_processed(flags.get(offset)) {
            done += 1;
            continue;
        }
        pending.push(UrlRow {
            row: start_row + offset as u32,
            url,
        });
    }

    info!(
        target: "sheets.rows",
        pending = pending.len(),
        processed = done,
        blank,
        "selected rows to scrape"
    );
    pending
}
