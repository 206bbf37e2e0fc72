//! Common types and utilities shared across Tally crates.
//!
//! This crate defines the runtime settings handed to the extraction core, the
//! observability bootstrap, and the shared error type. It is intentionally
//! lightweight so every crate in the workspace can depend on it.
//!
//! # Overview
//!
//! - [`ScrapeSettings`]: per-run extraction knobs, passed by reference into every extractor
//! - [`Timings`]: readiness timeouts and settle delays
//! - [`StealthLevel`] and [`OutputFormat`]: behavior enums shared by the driver and the binary
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`TallyError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use tally_common::{ScrapeSettings, StealthLevel};
//!
//! let settings = ScrapeSettings::default();
//! assert!(!settings.debug);
//! assert_eq!(settings.timings.ready_timeout.as_secs(), 15);
//! assert!(matches!(StealthLevel::default(), StealthLevel::Balanced));
//! ```
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod observability;

/// Knobs for a scraping run.
///
/// Built once by the binary and threaded into each extractor call; nothing in
/// the extraction core reads process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSettings {
    /// Narrate every declined strategy at `info` instead of `debug`.
    pub debug: bool,
    /// Host substring identifying answer URLs worth visiting.
    pub site_host: String,
    pub timings: Timings,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            debug: false,
            site_host: "quora.com".to_string(),
            timings: Timings::default(),
        }
    }
}

/// Waits observed around navigation.
///
/// `ready_timeout` bounds a real readiness poll. The settle delays are fixed
/// sleeps used only where the page gives no readiness signal for its
/// client-side rendering; they cost latency on every URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timings {
    pub ready_timeout: Duration,
    pub settle: Duration,
    pub log_settle: Duration,
    pub return_settle: Duration,
    pub inter_request_min: Duration,
    pub inter_request_max: Duration,
    pub post_write_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(15),
            settle: Duration::from_millis(3000),
            log_settle: Duration::from_millis(5000),
            return_settle: Duration::from_millis(3000),
            inter_request_min: Duration::from_millis(3000),
            inter_request_max: Duration::from_millis(7000),
            post_write_delay: Duration::from_millis(2000),
        }
    }
}

impl Timings {
    /// All waits collapsed to zero; used by tests driving fake renderers.
    pub fn immediate() -> Self {
        Self {
            ready_timeout: Duration::from_millis(50),
            settle: Duration::ZERO,
            log_settle: Duration::ZERO,
            return_settle: Duration::ZERO,
            inter_request_min: Duration::ZERO,
            inter_request_max: Duration::ZERO,
            post_write_delay: Duration::ZERO,
        }
    }
}

/// Browser automation stealth level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StealthLevel {
    Lightweight,
    #[default]
    Balanced,
    Maximum,
}

/// How single-URL results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Error types used across the Tally system.
#[derive(thiserror::Error, Debug)]
pub enum TallyError {
    /// The browser driver reported an error.
    #[error("Driver error: {0}")]
    Driver(#[from] anyhow::Error),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A page could not be reached or never became ready.
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Operation exceeded the configured timeout.
    #[error("Timeout occurred")]
    Timeout,
}

/// Convenient alias for results that use [`TallyError`].
pub type Result<T> = std::result::Result<T, TallyError>;
