//! Scripted in-memory page renderer for driving extractors without a browser.
#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tally_common::{ScrapeSettings, Timings};
use tally_drivers::{Locator, PageRenderer};

/// Settings with every wait collapsed.
pub fn fast_settings() -> ScrapeSettings {
    ScrapeSettings {
        debug: true,
        timings: Timings::immediate(),
        ..ScrapeSettings::default()
    }
}

/// What one URL renders as.
#[derive(Clone, Default)]
pub struct PageFixture {
    source: String,
    elements: HashMap<String, Vec<String>>,
    attributes: HashMap<(String, String), Vec<Option<String>>>,
    scripts: Vec<(String, Value)>,
    broken: HashSet<String>,
    redirect: Option<String>,
    not_ready: bool,
}

impl PageFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, html: &str) -> Self {
        self.source = html.to_string();
        self
    }

    /// Elements matching the locator whose value is `query` render `texts`.
    pub fn texts(mut self, query: &str, texts: &[&str]) -> Self {
        self.elements
            .insert(query.to_string(), texts.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn attribute(mut self, query: &str, name: &str, values: &[Option<&str>]) -> Self {
        self.attributes.insert(
            (query.to_string(), name.to_string()),
            values.iter().map(|v| v.map(str::to_string)).collect(),
        );
        self
    }

    /// Any script whose body contains `needle` evaluates to `value`.
    pub fn script(mut self, needle: &str, value: Value) -> Self {
        self.scripts.push((needle.to_string(), value));
        self
    }

    /// Lookups with this locator value fail instead of returning nothing.
    pub fn broken(mut self, query: &str) -> Self {
        self.broken.insert(query.to_string());
        self
    }

    /// The browser lands on `url` instead of the requested address.
    pub fn redirect(mut self, url: &str) -> Self {
        self.redirect = Some(url.to_string());
        self
    }

    pub fn never_ready(mut self) -> Self {
        self.not_ready = true;
        self
    }
}

#[derive(Default)]
struct State {
    current: String,
    visited: Vec<String>,
}

#[derive(Default)]
pub struct FakePage {
    pages: HashMap<String, PageFixture>,
    unreachable: HashSet<String>,
    state: Mutex<State>,
}

fn query(locator: &Locator) -> &str {
    match locator {
        Locator::Css(s) | Locator::XPath(s) => s,
    }
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the session already showing `url`.
    pub fn showing(self, url: &str) -> Self {
        self.state.lock().unwrap().current = url.to_string();
        self
    }

    pub fn page(mut self, url: &str, fixture: PageFixture) -> Self {
        self.pages.insert(url.to_string(), fixture);
        self
    }

    /// Navigation to `url` fails outright.
    pub fn unreachable(mut self, url: &str) -> Self {
        self.unreachable.insert(url.to_string());
        self
    }

    /// Every URL navigated to, in order.
    pub fn visited(&self) -> Vec<String> {
        self.state.lock().unwrap().visited.clone()
    }

    pub fn current(&self) -> String {
        self.state.lock().unwrap().current.clone()
    }

    fn fixture(&self) -> PageFixture {
        let current = self.current();
        self.pages.get(&current).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl PageRenderer for FakePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.visited.push(url.to_string());
        if self.unreachable.contains(url) {
            return Err(anyhow!("net::ERR_NAME_NOT_RESOLVED at {url}"));
        }
        state.current = self
            .pages
            .get(url)
            .and_then(|p| p.redirect.clone())
            .unwrap_or_else(|| url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.current())
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.fixture().source)
    }

    async fn element_texts(&self, locator: &Locator) -> Result<Vec<String>> {
        let fixture = self.fixture();
        let q = query(locator);
        if fixture.broken.contains(q) {
            return Err(anyhow!("stale element reference: {q}"));
        }
        Ok(fixture.elements.get(q).cloned().unwrap_or_default())
    }

    async fn element_attributes(
        &self,
        locator: &Locator,
        name: &str,
    ) -> Result<Vec<Option<String>>> {
        let fixture = self.fixture();
        let q = query(locator);
        if fixture.broken.contains(q) {
            return Err(anyhow!("stale element reference: {q}"));
        }
        Ok(fixture
            .attributes
            .get(&(q.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn evaluate_script(&self, script: &str, _args: Vec<Value>) -> Result<Value> {
        let fixture = self.fixture();
        if let Some(needle) = fixture.broken.iter().find(|n| script.contains(n.as_str())) {
            return Err(anyhow!("javascript error near {needle}"));
        }
        Ok(fixture
            .scripts
            .iter()
            .find(|(needle, _)| script.contains(needle.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null))
    }

    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        if self.fixture().not_ready {
            return Err(anyhow!("{locator} not present after {timeout:?}"));
        }
        Ok(())
    }
}
