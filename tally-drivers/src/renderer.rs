//! The page capability extractors run against.
//!
//! Extractors only ever see a `&dyn PageRenderer`, so the whole cascade can be
//! driven by a scripted fake in tests and by [`TallyPage`] in production.
//!
//! [`TallyPage`]: crate::tally_browser::page::TallyPage
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// A structural query against the rendered document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(path: impl Into<String>) -> Self {
        Locator::XPath(path.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css:{s}"),
            Locator::XPath(s) => write!(f, "xpath:{s}"),
        }
    }
}

/// Read access to a live, script-capable page.
///
/// A locator matching nothing is not an error: `element_texts` and
/// `element_attributes` return empty vectors. Errors are reserved for
/// transport failures and malformed queries.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Serialized HTML of the current document.
    async fn page_source(&self) -> Result<String>;

    /// Visible text of every element matching `locator`, in document order.
    async fn element_texts(&self, locator: &Locator) -> Result<Vec<String>>;

    /// Attribute `name` of every element matching `locator`, in document order.
    async fn element_attributes(&self, locator: &Locator, name: &str)
        -> Result<Vec<Option<String>>>;

    /// Run `script` as a function body; `args` are exposed as `arguments`.
    async fn evaluate_script(&self, script: &str, args: Vec<Value>) -> Result<Value>;

    /// Poll until `locator` matches or `timeout` elapses.
    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<()>;
}

/// Form interaction on top of [`PageRenderer`].
///
/// Each method acts on the first element matching the locator and returns
/// `Ok(false)` when nothing matched.
#[async_trait]
pub trait FormInput: PageRenderer {
    async fn type_into(&self, locator: &Locator, text: &str) -> Result<bool>;

    async fn click(&self, locator: &Locator) -> Result<bool>;

    async fn press_enter(&self, locator: &Locator) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locators_display_with_their_kind() {
        assert_eq!(Locator::css("body").to_string(), "css:body");
        assert_eq!(
            Locator::xpath("//span[1]").to_string(),
            "xpath://span[1]"
        );
    }
}
