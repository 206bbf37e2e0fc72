use async_trait::async_trait;
use chrono::Local;
use serde::Deserialize;
use serde_json::{Value, json};
use std::borrow::Cow;
use std::time::Duration;
use tally_config::{ColumnConfig, SheetConfig};
use tally_extract::AnswerRecord;
use tally_http::{Auth, HttpClient, HttpError, RequestOpts};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::rows::{UrlRow, normalize_range, select_pending, start_row};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const CODE_CELL: &str = "A1";
const CODE_PROMPT: &str = "Enter 2FA code here when prompted";

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("sheet.spreadsheet_id is not configured")]
    MissingSpreadsheet,
    #[error("sheet.access_token is not configured")]
    MissingToken,
    #[error(transparent)]
    Http(#[from] HttpError),
}

/// Where answer URLs come from and where their records go.
#[async_trait]
pub trait AnswerSheet: Send + Sync {
    /// Rows that have a URL and are not yet flagged processed.
    async fn pending_rows(&self, max: usize) -> Result<Vec<UrlRow>, SheetError>;

    /// Write one record into `row` and flag the row processed.
    async fn write_record(&self, row: u32, record: &AnswerRecord) -> Result<(), SheetError>;
}

/// A place an operator drops a one-time login code.
#[async_trait]
pub trait CodeInbox: Send + Sync {
    /// Poll for a code, consuming it when found. `None` after the attempts run out.
    async fn verification_code(&self) -> Result<Option<String>, SheetError>;
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct BatchGet {
    #[serde(rename = "valueRanges", default)]
    value_ranges: Vec<ValueRange>,
}

fn first_cells(range: Option<&ValueRange>) -> Vec<String> {
    range
        .map(|r| {
            r.values
                .iter()
                .map(|row| row.first().cloned().unwrap_or_default())
                .collect()
        })
        .unwrap_or_default()
}

/// A1 reference on `sheet`, quoting names that need it.
fn a1(sheet: &str, cells: &str) -> String {
    if sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        format!("{sheet}!{cells}")
    } else {
        format!("'{}'!{cells}", sheet.replace('\'', "''"))
    }
}

fn processed_column(range: &str) -> String {
    range.chars().take_while(|c| c.is_ascii_alphabetic()).collect()
}

fn mask(code: &str) -> String {
    let shown: String = code.chars().take(2).collect();
    format!("{shown}{}", "*".repeat(code.chars().count().saturating_sub(2)))
}

fn is_verification_code(value: &str) -> bool {
    value.len() >= 4 && value.bytes().all(|b| b.is_ascii_digit())
}

/// Google Sheets v4 backed [`AnswerSheet`] and [`CodeInbox`].
#[derive(Clone)]
pub struct SheetsClient {
    http: HttpClient,
    spreadsheet_id: String,
    token: String,
    sheet_name: String,
    url_range: String,
    code_sheet: String,
    code_attempts: u32,
    code_retry: Duration,
    columns: ColumnConfig,
}

impl SheetsClient {
    pub fn from_config(cfg: &SheetConfig) -> Result<Self, SheetError> {
        let spreadsheet_id = cfg
            .spreadsheet_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or(SheetError::MissingSpreadsheet)?;
        let token = cfg
            .access_token
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or(SheetError::MissingToken)?;
        Ok(Self {
            http: HttpClient::new(&cfg.api_base)?,
            spreadsheet_id,
            token,
            sheet_name: cfg.sheet_name.clone(),
            url_range: normalize_range(&cfg.url_range),
            code_sheet: cfg.code_sheet.clone(),
            code_attempts: cfg.code_attempts.max(1),
            code_retry: Duration::from_secs(cfg.code_retry_secs),
            columns: cfg.columns.clone(),
        })
    }

    fn opts<'a>(&'a self, query: Vec<(&'a str, Cow<'a, str>)>) -> RequestOpts<'a> {
        RequestOpts {
            auth: Auth::Bearer(&self.token),
            query,
            ..Default::default()
        }
    }

    fn values_path(&self, range: &str) -> String {
        format!("spreadsheets/{}/values/{range}", self.spreadsheet_id)
    }

    async fn read_code_cell(&self) -> Result<String, SheetError> {
        let range: ValueRange = self
            .http
            .get_json(
                &self.values_path(&a1(&self.code_sheet, CODE_CELL)),
                self.opts(vec![]),
            )
            .await?;
        Ok(first_cells(Some(&range)).into_iter().next().unwrap_or_default())
    }

    async fn write_code_cell(&self, text: &str) -> Result<(), SheetError> {
        let _: Value = self
            .http
            .put_json_opts(
                &self.values_path(&a1(&self.code_sheet, CODE_CELL)),
                &json!({ "values": [[text]] }),
                self.opts(vec![("valueInputOption", "RAW".into())]),
            )
            .await?;
        Ok(())
    }

    async fn create_code_sheet(&self) -> Result<(), SheetError> {
        info!(target: "sheets.code", sheet = %self.code_sheet, "creating code worksheet");
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": self.code_sheet,
                        "gridProperties": { "rowCount": 2, "columnCount": 2 }
                    }
                }
            }]
        });
        let _: Value = self
            .http
            .post_json_opts(
                &format!("spreadsheets/{}:batchUpdate", self.spreadsheet_id),
                &body,
                self.opts(vec![]),
            )
            .await?;
        self.write_code_cell(CODE_PROMPT).await
    }
}

fn is_missing_sheet(err: &SheetError) -> bool {
    match err {
        SheetError::Http(http) => {
            http.status().map(|s| s.as_u16()) == Some(400)
                && http.to_string().contains("Unable to parse range")
        }
        _ => false,
    }
}

#[async_trait]
impl AnswerSheet for SheetsClient {
    async fn pending_rows(&self, max: usize) -> Result<Vec<UrlRow>, SheetError> {
        let start = start_row(&self.url_range);
        let url_range = a1(&self.sheet_name, &self.url_range);
        let flag_column = processed_column(&self.columns.processed);
        let flag_range = a1(&self.sheet_name, &format!("{flag_column}{start}:{flag_column}"));

        let got: BatchGet = self
            .http
            .get_json(
                &format!("spreadsheets/{}/values:batchGet", self.spreadsheet_id),
                self.opts(vec![
                    ("ranges", url_range.as_str().into()),
                    ("ranges", flag_range.as_str().into()),
                    ("majorDimension", "ROWS".into()),
                ]),
            )
            .await?;

        let urls = first_cells(got.value_ranges.first());
        let flags = first_cells(got.value_ranges.get(1));
        debug!(
            target: "sheets.rows",
            range = %url_range,
            urls = urls.len(),
            flags = flags.len(),
            "read url and processed columns"
        );
        Ok(select_pending(start, &urls, &flags, max))
    }

    async fn write_record(&self, row: u32, record: &AnswerRecord) -> Result<(), SheetError> {
        let c = &self.columns;
        let scraped_at = record.scraped_at.format(TIMESTAMP_FORMAT).to_string();
        let cells = [
            (&c.base_url, record.base_thread_url.as_str()),
            (&c.author, record.author.as_str()),
            (&c.post_date, record.post_date.as_str()),
            (&c.views, record.stats.views.as_str()),
            (&c.upvotes, record.stats.upvotes.as_str()),
            (&c.comments, record.stats.comments.as_str()),
            (&c.shares, record.stats.shares.as_str()),
            (&c.scraped_at, scraped_at.as_str()),
            (&c.processed, "TRUE"),
        ];
        let data: Vec<Value> = cells
            .iter()
            .map(|(column, value)| {
                json!({
                    "range": a1(&self.sheet_name, &format!("{column}{row}")),
                    "values": [[value]],
                })
            })
            .collect();

        let _: Value = self
            .http
            .post_json_opts(
                &format!("spreadsheets/{}/values:batchUpdate", self.spreadsheet_id),
                &json!({ "valueInputOption": "RAW", "data": data }),
                self.opts(vec![]),
            )
            .await?;
        info!(target: "sheets.write", row, url = %record.answer_url, "record written");
        Ok(())
    }
}

#[async_trait]
impl CodeInbox for SheetsClient {
    async fn verification_code(&self) -> Result<Option<String>, SheetError> {
        for attempt in 1..=self.code_attempts {
            match self.read_code_cell().await {
                Ok(cell) => {
                    let code = cell.trim();
                    if is_verification_code(code) {
                        info!(target: "sheets.code", code = %mask(code), attempt, "verification code found");
                        let stamp = Local::now().format(TIMESTAMP_FORMAT);
                        if let Err(err) = self.write_code_cell(&format!("Code used at {stamp}")).await {
                            warn!(target: "sheets.code", error = %err, "could not mark code as used");
                        }
                        return Ok(Some(code.to_string()));
                    }
                    info!(
                        target: "sheets.code",
                        attempt,
                        attempts = self.code_attempts,
                        "no verification code yet"
                    );
                }
                Err(err) if is_missing_sheet(&err) => self.create_code_sheet().await?,
                Err(err) => return Err(err),
            }
            if attempt < self.code_attempts && !self.code_retry.is_zero() {
                tokio::time::sleep(self.code_retry).await;
            }
        }
        warn!(target: "sheets.code", attempts = self.code_attempts, "no verification code arrived");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a1_quotes_names_with_spaces() {
        assert_eq!(a1("Answers", "B7"), "Answers!B7");
        assert_eq!(a1("Q Answers", "B7"), "'Q Answers'!B7");
        assert_eq!(a1("Bob's", "A1"), "'Bob''s'!A1");
    }

    #[test]
    fn codes_are_digit_strings() {
        assert!(is_verification_code("123456"));
        assert!(is_verification_code("0042"));
        assert!(!is_verification_code("123"));
        assert!(!is_verification_code("12a456"));
        assert!(!is_verification_code("Code used at 2024-01-01 00:00:00"));
    }

    #[test]
    fn codes_are_masked_in_logs() {
        assert_eq!(mask("123456"), "12****");
        assert_eq!(mask("1"), "1");
    }

    #[test]
    fn processed_column_strips_row_numbers() {
        assert_eq!(processed_column("P"), "P");
        assert_eq!(processed_column("AB2"), "AB");
    }

    #[test]
    fn missing_settings_are_reported() {
        let err = SheetsClient::from_config(&SheetConfig::default()).err();
        assert!(matches!(err, Some(SheetError::MissingSpreadsheet)));

        let cfg = SheetConfig {
            spreadsheet_id: Some("abc".into()),
            ..SheetConfig::default()
        };
        assert!(matches!(SheetsClient::from_config(&cfg).err(), Some(SheetError::MissingToken)));
    }
}
