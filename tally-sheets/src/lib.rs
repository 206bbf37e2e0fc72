//! Spreadsheet collaborator: answer URLs in, scraped records out.
//!
//! Rows are read from one worksheet, filtered against a processed-flag
//! column, and written back one record per row. A second worksheet doubles
//! as an inbox for one-time login codes.

pub mod client;
pub mod rows;

pub use client::{AnswerSheet, CodeInbox, SheetError, SheetsClient, TIMESTAMP_FORMAT};
pub use rows::{UrlRow, is_target_url, normalize_range, select_pending, start_row};
