//! Ordered extraction strategies and the loop that runs them.
//!
//! A [`Strategy`] is plain data: where to look ([`Locate`]), how to pull a raw
//! value out of what was found ([`Extract`]), whether that value is believable
//! ([`Validate`]), and how to canonicalise it ([`Transform`]). A
//! [`FieldCascade`] is an ordered list of strategies plus the value to fall
//! back on when every one of them declines.

use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;
use tally_common::ScrapeSettings;
use tally_drivers::{Locator, PageRenderer};
use tracing::{debug, info};

use crate::normalize::normalize_count;

static COUNT_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:,\d+)*(?:\.\d+)?[KkMm]?$").expect("count pattern"));

/// Digit-only values this long are internal ids, not displayed counts.
const MAX_PLAIN_DIGITS: usize = 10;

/// The fields an answer page is mined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Author,
    Views,
    Upvotes,
    Comments,
    Shares,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Author => "author",
            Field::Views => "views",
            Field::Upvotes => "upvotes",
            Field::Comments => "comments",
            Field::Shares => "shares",
        })
    }
}

/// Where a strategy reads raw text from.
#[derive(Debug, Clone)]
pub enum Locate {
    /// Visible text of every element matching the locator.
    Elements(Locator),
    /// One attribute of every element matching the locator.
    Attribute(Locator, &'static str),
    /// In-page script; a string, number, or array of strings is accepted.
    Script(&'static str),
    /// The URL the browser currently shows.
    CurrentUrl,
}

/// How a raw value is cut out of located text.
#[derive(Debug, Clone)]
pub enum Extract {
    /// The trimmed text itself.
    Whole,
    /// Every ASCII digit in the text, concatenated.
    Digits,
    /// Capture group 1 of the first match.
    Phrase(Regex),
}

/// Plausibility check applied to an extracted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validate {
    Count,
    Author,
    Present,
}

/// Canonicalisation applied to a validated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Identity,
    NormalizeCount,
    SlugToName,
}

#[derive(Debug, Clone)]
pub struct Strategy {
    pub name: &'static str,
    pub locate: Locate,
    pub extract: Extract,
    pub validate: Validate,
    pub transform: Transform,
}

impl Strategy {
    /// A count read from located text, normalised on success.
    pub fn count(name: &'static str, locate: Locate, extract: Extract) -> Self {
        Self {
            name,
            locate,
            extract,
            validate: Validate::Count,
            transform: Transform::NormalizeCount,
        }
    }

    /// First value produced by this strategy that survives validation.
    ///
    /// `Err` and `Ok(None)` both mean the strategy declined.
    pub async fn attempt(&self, page: &dyn PageRenderer) -> anyhow::Result<Option<String>> {
        for raw in self.locate.collect(page).await? {
            let Some(value) = self.extract.apply(&raw) else {
                continue;
            };
            if self.validate.accepts(&value) {
                return Ok(Some(self.transform.apply(&value)));
            }
        }
        Ok(None)
    }
}

impl Locate {
    async fn collect(&self, page: &dyn PageRenderer) -> anyhow::Result<Vec<String>> {
        match self {
            Locate::Elements(locator) => page.element_texts(locator).await,
            Locate::Attribute(locator, name) => Ok(page
                .element_attributes(locator, name)
                .await?
                .into_iter()
                .flatten()
                .collect()),
            Locate::Script(code) => Ok(script_strings(page.evaluate_script(code, vec![]).await?)),
            Locate::CurrentUrl => Ok(vec![page.current_url().await?]),
        }
    }
}

/// Flatten a script result into candidate strings.
pub(crate) fn script_strings(value: Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s],
        Value::Number(n) => vec![n.to_string()],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

impl Extract {
    fn apply(&self, raw: &str) -> Option<String> {
        let value = match self {
            Extract::Whole => raw.trim().to_string(),
            Extract::Digits => raw.chars().filter(char::is_ascii_digit).collect(),
            Extract::Phrase(re) => re.captures(raw)?.get(1)?.as_str().trim().to_string(),
        };
        (!value.is_empty()).then_some(value)
    }
}

impl Validate {
    pub fn accepts(&self, value: &str) -> bool {
        let value = value.trim();
        match self {
            Validate::Count => {
                COUNT_SHAPE.is_match(value)
                    && !(value.bytes().all(|b| b.is_ascii_digit()) && value.len() >= MAX_PLAIN_DIGITS)
            }
            Validate::Author => {
                value.chars().count() > 1 && !value.to_lowercase().contains("answer")
            }
            Validate::Present => !value.is_empty(),
        }
    }
}

impl Transform {
    fn apply(&self, value: &str) -> String {
        let value = value.trim();
        match self {
            Transform::Identity => value.to_string(),
            Transform::NormalizeCount => normalize_count(value),
            Transform::SlugToName => value.replace('-', " "),
        }
    }
}

/// An ordered strategy list for one field.
#[derive(Debug, Clone)]
pub struct FieldCascade {
    pub field: Field,
    pub strategies: Vec<Strategy>,
    pub default: &'static str,
}

impl FieldCascade {
    /// Run strategies in order and return the first accepted value, or the
    /// field's default once all of them decline. Never fails.
    pub async fn extract(&self, page: &dyn PageRenderer, settings: &ScrapeSettings) -> String {
        for strategy in &self.strategies {
            match strategy.attempt(page).await {
                Ok(Some(value)) => {
                    info!(
                        target: "extract.cascade",
                        field = %self.field,
                        strategy = strategy.name,
                        %value,
                        "field extracted"
                    );
                    return value;
                }
                Ok(None) => narrate_miss(settings, self.field, strategy.name, None),
                Err(err) => narrate_miss(settings, self.field, strategy.name, Some(&err)),
            }
        }
        info!(
            target: "extract.cascade",
            field = %self.field,
            default = self.default,
            "all strategies declined; using default"
        );
        self.default.to_string()
    }
}

fn narrate_miss(settings: &ScrapeSettings, field: Field, strategy: &str, err: Option<&anyhow::Error>) {
    let error = err.map(|e| e.to_string());
    if settings.debug {
        info!(target: "extract.cascade", %field, strategy, error = ?error, "strategy declined");
    } else {
        debug!(target: "extract.cascade", %field, strategy, error = ?error, "strategy declined");
    }
}
