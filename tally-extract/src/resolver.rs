//! Earliest posting date for an answer.
//!
//! The revision log lists every edit, so its oldest entry is the creation
//! date. When the log is unreachable or yields nothing, the answer page's own
//! source is scanned instead; it usually only shows the last edit, so that
//! path is lower confidence. Failing both, an `Approx.` sentinel carrying
//! today's date is returned.

use chrono::Local;
use serde_json::Value;
use std::time::Duration;
use tally_common::ScrapeSettings;
use tally_drivers::{Locator, PageRenderer};
use tracing::{debug, info, warn};

use crate::cascade::script_strings;
use crate::dates::{DateCandidate, approximate, earliest, parse_fragment, scan_text};
use crate::urls::log_url;

/// Text that marks a log page we are not allowed to read.
const RESTRICTION_MARKERS: [&str; 6] = [
    "Something went wrong",
    "You need to login to view this page",
    "Log in to Quora",
    "Page not found",
    "This content isn't available right now",
    "The page you requested was not found",
];

/// Date spans identified by their styling on the log page.
const STRUCTURAL_DATE_SCRIPT: &str = r#"
let spans = Array.from(document.querySelectorAll('span.c1h7helg.c8970ew'));
if (spans.length === 0) {
    spans = Array.from(document.querySelectorAll(
        'span.q-text.qu-dynamicFontSize--small, span.q-text.qu-color--gray_light, span[class*="qu-color--gray"]'
    ));
}
return spans.map(span => span.textContent.trim());
"#;

/// Any span whose text starts like a date, regardless of styling.
const PATTERN_DATE_SCRIPT: &str = r#"
const monthFirst = /^(January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+\d{1,2},\s+\d{4}/;
const dayFirst = /\d{1,2}\s+(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec|January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{4}/;
return Array.from(document.querySelectorAll('span'))
    .map(span => span.textContent.trim())
    .filter(text => monthFirst.test(text) || dayFirst.test(text));
"#;

/// A block mentioning creation ("posted", "answered", ...) next to a date.
const CREATION_MARKER_SCRIPT: &str = r#"
const datePattern = /(January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+\d{1,2},\s+\d{4}/;
const markers = ['posted', 'created', 'wrote', 'answered', 'original answer', 'first posted', 'initially answered'];
for (const div of document.querySelectorAll('div')) {
    const lower = div.textContent.toLowerCase();
    if (!markers.some(marker => lower.includes(marker))) continue;
    if (datePattern.test(div.textContent)) {
        return { element: div.textContent, dateText: div.textContent };
    }
    const nearby = [div.previousElementSibling, div.nextElementSibling, ...div.children].filter(Boolean);
    for (const el of nearby) {
        if (datePattern.test(el.textContent)) {
            return { element: div.textContent, dateText: el.textContent };
        }
    }
}
return null;
"#;

/// Which restriction marker, if any, the log page shows.
pub fn restriction_reason(current_url: &str, source: &str) -> Option<&'static str> {
    if current_url.to_lowercase().contains("login") {
        return Some("redirected to login");
    }
    RESTRICTION_MARKERS
        .iter()
        .find(|marker| source.contains(*marker))
        .copied()
}

pub(crate) async fn settle(pause: Duration) {
    if !pause.is_zero() {
        tokio::time::sleep(pause).await;
    }
}

/// Resolve the display string for an answer's original posting date.
///
/// Never fails. The browser is always steered back to the page it was on
/// when this was called.
pub async fn resolve_post_date(
    page: &dyn PageRenderer,
    answer_url: &str,
    settings: &ScrapeSettings,
) -> String {
    let original = match page.current_url().await {
        Ok(url) => url,
        Err(err) => {
            debug!(target: "extract.date", error = %err, "current url unavailable; using answer url");
            answer_url.to_string()
        }
    };

    let from_log = scan_log_page(page, &log_url(answer_url), settings).await;

    if let Err(err) = page.navigate(&original).await {
        warn!(target: "extract.date", url = %original, error = %err, "could not return to answer page");
    }
    settle(settings.timings.return_settle).await;

    if let Some(found) = from_log {
        info!(target: "extract.date", date = %found.display, source = "log", "post date resolved");
        return found.display;
    }

    match page.page_source().await {
        Ok(source) => {
            let candidates = scan_text(&source);
            if let Some(found) = earliest(&candidates) {
                info!(
                    target: "extract.date",
                    date = %found.display,
                    source = "page_source",
                    candidates = candidates.len(),
                    "post date resolved"
                );
                return found.display.clone();
            }
            info!(target: "extract.date", "no usable dates in page source");
        }
        Err(err) => warn!(target: "extract.date", error = %err, "page source unavailable"),
    }

    let fallback = approximate(Local::now().date_naive());
    info!(target: "extract.date", date = %fallback, "post date approximated");
    fallback
}

async fn scan_log_page(
    page: &dyn PageRenderer,
    log: &str,
    settings: &ScrapeSettings,
) -> Option<DateCandidate> {
    info!(target: "extract.date", url = %log, "opening revision log");
    if let Err(err) = page.navigate(log).await {
        warn!(target: "extract.date", url = %log, error = %err, "revision log unreachable");
        return None;
    }
    if let Err(err) = page
        .wait_for(&Locator::css("body"), settings.timings.ready_timeout)
        .await
    {
        debug!(target: "extract.date", error = %err, "revision log never signalled ready");
    }
    settle(settings.timings.log_settle).await;

    let current = page.current_url().await.unwrap_or_default();
    let source = match page.page_source().await {
        Ok(source) => source,
        Err(err) => {
            warn!(target: "extract.date", error = %err, "revision log source unavailable");
            return None;
        }
    };
    if let Some(reason) = restriction_reason(&current, &source) {
        info!(target: "extract.date", %reason, "revision log restricted");
        return None;
    }

    for (tier, script) in [("structural", STRUCTURAL_DATE_SCRIPT), ("pattern", PATTERN_DATE_SCRIPT)] {
        let fragments = date_fragments(page, script, tier, settings).await;
        let candidates: Vec<DateCandidate> =
            fragments.iter().filter_map(|f| parse_fragment(f)).collect();
        debug!(
            target: "extract.date",
            tier,
            fragments = fragments.len(),
            parsed = candidates.len(),
            "scanned log fragments"
        );
        if let Some(found) = earliest(&candidates) {
            return Some(found.clone());
        }
    }

    match page.evaluate_script(CREATION_MARKER_SCRIPT, vec![]).await {
        Ok(Value::Object(hit)) => {
            let text = hit.get("dateText").and_then(Value::as_str).unwrap_or_default();
            let found = parse_fragment(text);
            if found.is_some() {
                info!(target: "extract.date", "creation marker found on revision log");
            }
            found
        }
        Ok(_) => None,
        Err(err) => {
            debug!(target: "extract.date", error = %err, "creation marker lookup failed");
            None
        }
    }
}

async fn date_fragments(
    page: &dyn PageRenderer,
    script: &str,
    tier: &str,
    settings: &ScrapeSettings,
) -> Vec<String> {
    match page.evaluate_script(script, vec![]).await {
        Ok(value) => script_strings(value),
        Err(err) => {
            if settings.debug {
                info!(target: "extract.date", tier, error = %err, "date fragment lookup failed");
            } else {
                debug!(target: "extract.date", tier, error = %err, "date fragment lookup failed");
            }
            Vec::new()
        }
    }
}
