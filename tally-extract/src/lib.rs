//! Answer-page extraction: count normalization, date parsing, field
//! cascades, earliest-date resolution, and record assembly.
//!
//! Everything here runs against a [`tally_drivers::PageRenderer`], so a
//! scripted fake is enough to exercise it without a browser.
//!
//! ```no_run
//! # async fn demo(page: &dyn tally_drivers::PageRenderer) {
//! use tally_common::ScrapeSettings;
//!
//! let settings = ScrapeSettings::default();
//! let record = tally_extract::scrape_answer(
//!     page,
//!     "https://www.quora.com/Some-Question/answer/Some-Author",
//!     &settings,
//! )
//! .await;
//! println!("{} views", record.stats.views);
//! # }
//! ```

pub mod cascade;
pub mod dates;
pub mod fields;
pub mod normalize;
pub mod record;
pub mod resolver;
pub mod urls;

pub use cascade::{Extract, Field, FieldCascade, Locate, Strategy, Transform, Validate};
pub use dates::{DateCandidate, earliest, is_approximate, parse_fragment, scan_text};
pub use fields::{
    NAME_NOT_FOUND, ZERO_COUNT, cascade_for, extract_author, extract_comments, extract_shares,
    extract_upvotes, extract_views, is_deleted,
};
pub use normalize::normalize_count;
pub use record::{
    AnswerRecord, AnswerStats, ERROR_SENTINEL, POST_DELETED, RecordState, ScrapeError,
    scrape_answer,
};
pub use resolver::resolve_post_date;
pub use urls::{base_thread_url, log_url};
