//! One result per answer URL, built by a small state machine.
//!
//! ```text
//! Start -> Loaded -> Deleted -> Extracted -> Done
//!                 \-> Active  -/
//! Start -> Failed
//! ```
//!
//! Only the `Start -> Loaded` transition can fail; everything after it runs
//! against cascades and a resolver that always produce a value.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tally_common::ScrapeSettings;
use tally_drivers::{Locator, PageRenderer};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fields::{
    extract_author, extract_comments, extract_shares, extract_upvotes, extract_views, is_deleted,
};
use crate::resolver::{resolve_post_date, settle};
use crate::urls::base_thread_url;

pub const POST_DELETED: &str = "POST DELETED";
pub const ERROR_SENTINEL: &str = "Error";

/// Why an answer page could not be brought to a readable state.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("{url} not ready within {timeout:?}: {reason}")]
    NotReady {
        url: String,
        timeout: Duration,
        reason: String,
    },
}

/// Engagement counters, each a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerStats {
    pub views: String,
    pub upvotes: String,
    pub comments: String,
    pub shares: String,
}

impl Default for AnswerStats {
    fn default() -> Self {
        Self {
            views: "0".into(),
            upvotes: "0".into(),
            comments: "0".into(),
            shares: "0".into(),
        }
    }
}

/// Everything scraped for one answer URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub answer_url: String,
    pub base_thread_url: String,
    pub author: String,
    pub post_date: String,
    pub stats: AnswerStats,
    pub scraped_at: DateTime<Local>,
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnswerRecord {
    /// Sentinel record for a URL whose page never loaded.
    pub fn failed(answer_url: &str, error: impl ToString) -> Self {
        Self {
            answer_url: answer_url.to_string(),
            base_thread_url: base_thread_url(answer_url),
            author: ERROR_SENTINEL.to_string(),
            post_date: ERROR_SENTINEL.to_string(),
            stats: AnswerStats::default(),
            scraped_at: Local::now(),
            is_deleted: false,
            error: Some(error.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Position of a record build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Start,
    Loaded,
    Deleted,
    Active,
    Extracted,
    Done,
    Failed,
}

#[derive(Debug, Default)]
struct Draft {
    author: Option<String>,
    post_date: Option<String>,
    stats: AnswerStats,
    is_deleted: bool,
    error: Option<ScrapeError>,
}

/// Navigate to `answer_url` and scrape it into an [`AnswerRecord`].
///
/// Never fails: a page that cannot be loaded yields a record with `error`
/// set and sentinel values everywhere else.
pub async fn scrape_answer(
    page: &dyn PageRenderer,
    answer_url: &str,
    settings: &ScrapeSettings,
) -> AnswerRecord {
    let mut draft = Draft::default();
    let mut state = RecordState::Start;

    loop {
        let next = match state {
            RecordState::Start => match load(page, answer_url, settings).await {
                Ok(()) => RecordState::Loaded,
                Err(err) => {
                    draft.error = Some(err);
                    RecordState::Failed
                }
            },
            RecordState::Loaded => {
                if is_deleted(page, settings).await {
                    RecordState::Deleted
                } else {
                    RecordState::Active
                }
            }
            RecordState::Deleted => {
                draft.is_deleted = true;
                draft.author = Some(POST_DELETED.to_string());
                draft.post_date = Some(resolve_post_date(page, answer_url, settings).await);
                draft.stats = AnswerStats::default();
                RecordState::Extracted
            }
            RecordState::Active => {
                // The resolver navigates away and back, so read the author first.
                draft.author = Some(extract_author(page, settings).await);
                draft.post_date = Some(resolve_post_date(page, answer_url, settings).await);
                draft.stats = AnswerStats {
                    views: extract_views(page, settings).await,
                    upvotes: extract_upvotes(page, settings).await,
                    comments: extract_comments(page, settings).await,
                    shares: extract_shares(page, settings).await,
                };
                RecordState::Extracted
            }
            RecordState::Extracted => RecordState::Done,
            RecordState::Done => return draft.finish(answer_url),
            RecordState::Failed => {
                let record = match draft.error {
                    Some(err) => AnswerRecord::failed(answer_url, err),
                    None => AnswerRecord::failed(answer_url, "unknown failure"),
                };
                warn!(
                    target: "extract.record",
                    url = answer_url,
                    error = record.error.as_deref().unwrap_or_default(),
                    "answer could not be scraped"
                );
                return record;
            }
        };
        debug!(target: "extract.record", url = answer_url, from = ?state, to = ?next, "state transition");
        state = next;
    }
}

async fn load(
    page: &dyn PageRenderer,
    answer_url: &str,
    settings: &ScrapeSettings,
) -> Result<(), ScrapeError> {
    info!(target: "extract.record", url = answer_url, "navigating to answer");
    page.navigate(answer_url)
        .await
        .map_err(|e| ScrapeError::Navigation {
            url: answer_url.to_string(),
            reason: format!("{e:#}"),
        })?;

    let timeout = settings.timings.ready_timeout;
    page.wait_for(&Locator::css("body"), timeout)
        .await
        .map_err(|e| ScrapeError::NotReady {
            url: answer_url.to_string(),
            timeout,
            reason: format!("{e:#}"),
        })?;

    // No readiness signal exists for client-side rendering of the answer body.
    settle(settings.timings.settle).await;

    if let Ok(current) = page.current_url().await {
        debug!(target: "extract.record", url = answer_url, %current, "answer page loaded");
    }
    Ok(())
}

impl Draft {
    fn finish(self, answer_url: &str) -> AnswerRecord {
        let record = AnswerRecord {
            answer_url: answer_url.to_string(),
            base_thread_url: base_thread_url(answer_url),
            author: self
                .author
                .unwrap_or_else(|| crate::fields::NAME_NOT_FOUND.to_string()),
            post_date: self
                .post_date
                .unwrap_or_else(|| crate::dates::approximate(Local::now().date_naive())),
            stats: self.stats,
            scraped_at: Local::now(),
            is_deleted: self.is_deleted,
            error: None,
        };
        info!(
            target: "extract.record",
            url = %record.answer_url,
            thread = %record.base_thread_url,
            author = %record.author,
            post_date = %record.post_date,
            views = %record.stats.views,
            upvotes = %record.stats.upvotes,
            comments = %record.stats.comments,
            shares = %record.stats.shares,
            deleted = record.is_deleted,
            "answer scraped"
        );
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_record_carries_sentinels() {
        let record = AnswerRecord::failed(
            "https://q.com/T/answer/A",
            ScrapeError::Navigation {
                url: "https://q.com/T/answer/A".into(),
                reason: "connection refused".into(),
            },
        );
        assert!(record.is_failed());
        assert_eq!(record.author, ERROR_SENTINEL);
        assert_eq!(record.post_date, ERROR_SENTINEL);
        assert_eq!(record.stats, AnswerStats::default());
        assert_eq!(record.base_thread_url, "https://q.com/T");
        assert!(record.error.unwrap().contains("connection refused"));
    }

    #[test]
    fn records_serialize_without_empty_error() {
        let mut record = AnswerRecord::failed("https://q.com/T/answer/A", "x");
        record.error = None;
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["stats"]["views"], "0");
        assert_eq!(json["is_deleted"], false);
    }
}
