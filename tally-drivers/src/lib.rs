//! Driver layer for browser automation.
//!
//! This crate exposes the page-rendering capability the extraction core is
//! written against, plus the WebDriver-backed implementation used in
//! production.
//!
//! - [`renderer::PageRenderer`]: what the extractors may ask of a live page
//! - [`renderer::FormInput`]: typing and clicking, used by the login flow
//! - [`tally_browser::driver::TallyDriver`]: WebDriver client wrapper
//! - [`tally_browser::page::TallyPage`]: `PageRenderer` over a `fantoccini` session
//! - [`tally_browser::behavioral::BehavioralEngine`]: human-like timings and typing
//! - [`tally_browser::stealth`]: stealth profiles and JS evasions
pub mod renderer;
pub mod tally_browser;

pub use renderer::{FormInput, Locator, PageRenderer};
