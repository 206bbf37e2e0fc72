use anyhow::Result;
use std::fmt::Write as _;
use tally_common::{OutputFormat, ScrapeSettings};
use tally_drivers::PageRenderer;
use tally_drivers::tally_browser::behavioral::BehavioralEngine;
use tally_extract::{AnswerRecord, scrape_answer};
use tally_sheets::{AnswerSheet, UrlRow, is_target_url};
use tracing::{debug, info, warn};

/// What one pass over the sheet produced.
#[derive(Debug, Default)]
pub struct RunReport {
    pub records: Vec<(u32, AnswerRecord)>,
    pub skipped: Vec<UrlRow>,
    pub written: usize,
    pub write_failures: usize,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.records.iter().filter(|(_, r)| r.is_failed()).count()
    }

    pub fn log_summary(&self) {
        for (row, record) in &self.records {
            info!(
                target: "app.run",
                row,
                url = %record.answer_url,
                author = %record.author,
                post_date = %record.post_date,
                views = %record.stats.views,
                upvotes = %record.stats.upvotes,
                comments = %record.stats.comments,
                shares = %record.stats.shares,
                error = record.error.as_deref().unwrap_or(""),
                "summary"
            );
        }
        info!(
            target: "app.run",
            scraped = self.records.len(),
            written = self.written,
            failed = self.failed(),
            write_failures = self.write_failures,
            skipped = self.skipped.len(),
            "run finished"
        );
    }
}

/// Scrape `rows` one at a time and write each usable record back.
///
/// Neither a failed scrape nor a failed write stops the loop.
pub async fn run_rows(
    page: &dyn PageRenderer,
    sheet: &dyn AnswerSheet,
    rows: Vec<UrlRow>,
    settings: &ScrapeSettings,
    behavior: &BehavioralEngine,
) -> RunReport {
    let mut report = RunReport::default();
    let total = rows.len();

    for (index, row) in rows.into_iter().enumerate() {
        if !is_target_url(&row.url, &settings.site_host) {
            warn!(target: "app.run", row = row.row, url = %row.url, "not an answer url; skipping");
            report.skipped.push(row);
            continue;
        }
        info!(target: "app.run", row = row.row, position = index + 1, total, url = %row.url, "processing");

        let record = scrape_answer(page, &row.url, settings).await;
        if let Some(error) = &record.error {
            warn!(target: "app.run", row = row.row, %error, "scrape failed; row left for a later run");
        } else {
            match sheet.write_record(row.row, &record).await {
                Ok(()) => report.written += 1,
                Err(err) => {
                    report.write_failures += 1;
                    warn!(target: "app.run", row = row.row, error = %err, "sheet write failed");
                }
            }
            behavior
                .random_pause(settings.timings.post_write_delay, settings.timings.post_write_delay)
                .await;
        }
        report.records.push((row.row, record));

        if index + 1 < total {
            let waited = behavior
                .random_pause(
                    settings.timings.inter_request_min,
                    settings.timings.inter_request_max,
                )
                .await;
            debug!(target: "app.run", ?waited, "inter-request delay");
        }
    }
    report
}

/// Render a record for single-URL mode.
pub fn render_record(record: &AnswerRecord, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(record)?);
    }
    let mut out = String::new();
    writeln!(out, "Answer URL:  {}", record.answer_url)?;
    writeln!(out, "Thread URL:  {}", record.base_thread_url)?;
    writeln!(out, "Author:      {}", record.author)?;
    writeln!(out, "Posted:      {}", record.post_date)?;
    writeln!(out, "Views:       {}", record.stats.views)?;
    writeln!(out, "Upvotes:     {}", record.stats.upvotes)?;
    writeln!(out, "Comments:    {}", record.stats.comments)?;
    writeln!(out, "Shares:      {}", record.stats.shares)?;
    writeln!(out, "Deleted:     {}", record.is_deleted)?;
    writeln!(out, "Scraped at:  {}", record.scraped_at.format(tally_sheets::TIMESTAMP_FORMAT))?;
    if let Some(error) = &record.error {
        writeln!(out, "Error:       {error}")?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;
    use std::time::Duration;
    use tally_common::Timings;
    use tally_drivers::Locator;
    use tally_sheets::SheetError;

    /// Every page is blank except those listed as unreachable.
    struct BlankSite {
        unreachable: Vec<&'static str>,
        current: Mutex<String>,
    }

    #[async_trait]
    impl PageRenderer for BlankSite {
        async fn navigate(&self, url: &str) -> Result<()> {
            if self.unreachable.iter().any(|u| *u == url) {
                return Err(anyhow!("net::ERR_CONNECTION_RESET"));
            }
            *self.current.lock().unwrap() = url.to_string();
            Ok(())
        }
        async fn current_url(&self) -> Result<String> {
            Ok(self.current.lock().unwrap().clone())
        }
        async fn page_source(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn element_texts(&self, _: &Locator) -> Result<Vec<String>> {
            Ok(vec![])
        }
        async fn element_attributes(&self, _: &Locator, _: &str) -> Result<Vec<Option<String>>> {
            Ok(vec![])
        }
        async fn evaluate_script(&self, _: &str, _: Vec<Value>) -> Result<Value> {
            Ok(Value::Null)
        }
        async fn wait_for(&self, _: &Locator, _: Duration) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSheet {
        rejects: Vec<u32>,
        writes: Mutex<Vec<(u32, String)>>,
    }

    #[async_trait]
    impl AnswerSheet for RecordingSheet {
        async fn pending_rows(&self, _: usize) -> std::result::Result<Vec<UrlRow>, SheetError> {
            Ok(vec![])
        }
        async fn write_record(
            &self,
            row: u32,
            record: &AnswerRecord,
        ) -> std::result::Result<(), SheetError> {
            if self.rejects.contains(&row) {
                return Err(SheetError::MissingToken);
            }
            self.writes.lock().unwrap().push((row, record.author.clone()));
            Ok(())
        }
    }

    fn row(row: u32, url: &str) -> UrlRow {
        UrlRow { row, url: url.into() }
    }

    fn settings() -> ScrapeSettings {
        ScrapeSettings {
            timings: Timings::immediate(),
            ..ScrapeSettings::default()
        }
    }

    #[tokio::test]
    async fn failures_skip_the_write_and_the_loop_continues() {
        let page = BlankSite {
            unreachable: vec!["https://www.quora.com/Q2/answer/B"],
            current: Mutex::new(String::new()),
        };
        let sheet = RecordingSheet {
            rejects: vec![4],
            ..Default::default()
        };
        let rows = vec![
            row(2, "https://www.quora.com/Q1/answer/Ann-Lee"),
            row(3, "https://www.quora.com/Q2/answer/B"),
            row(4, "https://www.quora.com/Q3/answer/Cy-Dee"),
            row(5, "https://example.com/not-an-answer"),
        ];

        let report = run_rows(&page, &sheet, rows, &settings(), &BehavioralEngine::new()).await;

        assert_eq!(report.records.len(), 3);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.written, 1);
        assert_eq!(report.write_failures, 1);
        assert_eq!(report.skipped, vec![row(5, "https://example.com/not-an-answer")]);
        assert_eq!(
            sheet.writes.lock().unwrap().as_slice(),
            [(2, "Ann Lee".to_string())]
        );
        assert!(report.records[1].1.error.as_deref().unwrap().contains("ERR_CONNECTION_RESET"));
    }

    #[test]
    fn text_rendering_lists_every_field() {
        let record = AnswerRecord::failed("https://www.quora.com/Q/answer/A", "boom");
        let text = render_record(&record, OutputFormat::Text).unwrap();
        assert!(text.contains("Thread URL:  https://www.quora.com/Q"));
        assert!(text.contains("Views:       0"));
        assert!(text.contains("Error:       boom"));
    }

    #[test]
    fn json_rendering_is_the_serialized_record() {
        let mut record = AnswerRecord::failed("https://www.quora.com/Q/answer/A", "boom");
        record.error = None;
        let json: Value =
            serde_json::from_str(&render_record(&record, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["answer_url"], "https://www.quora.com/Q/answer/A");
        assert!(json.get("error").is_none());
    }
}
