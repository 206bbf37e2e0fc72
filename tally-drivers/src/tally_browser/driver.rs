use crate::tally_browser::{
    behavioral::BehavioralEngine,
    fingerprint::UserAgentManager,
    page::TallyPage,
    stealth::{build_stealth_arguments, StealthProfile},
};
use anyhow::Context;
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tally_common::{Result, TallyError};
use tracing::info;
use webdriver::capabilities::Capabilities;

/// How to reach and launch the browser.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// WebDriver endpoint, e.g. a local `chromedriver` on port 9515.
    pub webdriver_url: String,
    pub headless: bool,
    pub stealth: StealthProfile,
    pub page_load_timeout: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: false,
            stealth: StealthProfile::Balanced,
            page_load_timeout: Duration::from_secs(60),
        }
    }
}

/// Thin wrapper around a `fantoccini` WebDriver client with stealth and
/// behavioral helpers.
pub struct TallyDriver {
    pub client: Client,
    pub behavioral_engine: BehavioralEngine,
    pub user_agent_manager: UserAgentManager,
    pub stealth_profile: StealthProfile,
}

/// Reject endpoints that can never reach a WebDriver service.
fn check_endpoint(url: &str) -> Result<()> {
    let url = url.trim();
    if url.is_empty() {
        return Err(TallyError::Config("browser.webdriver_url is empty".to_string()));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(TallyError::Config(format!(
            "browser.webdriver_url must be an http(s) url, got {url:?}"
        )));
    }
    Ok(())
}

impl TallyDriver {
    /// Open a browser session on the configured WebDriver service.
    ///
    /// A malformed endpoint is a [`TallyError::Config`]; anything the
    /// WebDriver service reports is a [`TallyError::Driver`].
    pub async fn connect(options: &DriverOptions) -> Result<Self> {
        check_endpoint(&options.webdriver_url)?;

        let mut caps = Capabilities::new();
        let mut chrome_opts = HashMap::new();
        let mut user_agent_manager = UserAgentManager::new();
        let user_agent_profile = user_agent_manager.session_profile(&options.stealth);

        let args = build_stealth_arguments(&options.stealth, &user_agent_profile, options.headless);
        chrome_opts.insert("args".to_string(), json!(args));
        chrome_opts.insert(
            "excludeSwitches".to_string(),
            json!(["enable-automation"]),
        );
        caps.insert("goog:chromeOptions".to_string(), json!(chrome_opts));

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&options.webdriver_url)
            .await
            .with_context(|| format!("connecting to WebDriver at {}", options.webdriver_url))?;

        client
            .update_timeouts(TimeoutConfiguration::new(
                Some(Duration::from_secs(30)),
                Some(options.page_load_timeout),
                None,
            ))
            .await
            .context("setting WebDriver timeouts")?;

        info!(
            target: "browser.driver",
            webdriver_url = %options.webdriver_url,
            headless = options.headless,
            stealth = ?options.stealth,
            "browser session started"
        );

        Ok(Self {
            client,
            behavioral_engine: BehavioralEngine::new(),
            user_agent_manager,
            stealth_profile: options.stealth,
        })
    }

    /// A [`TallyPage`] bound to this session's single tab.
    pub fn page(&mut self) -> TallyPage {
        TallyPage::new(
            self.client.clone(),
            self.stealth_profile,
            self.user_agent_manager.session_profile(&self.stealth_profile),
            self.behavioral_engine.clone(),
        )
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<()> {
        self.client
            .close()
            .await
            .context("closing browser session")?;
        info!(target: "browser.driver", "browser session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_must_be_http() {
        assert!(check_endpoint("http://localhost:9515").is_ok());
        assert!(check_endpoint(" https://grid.internal/wd/hub ").is_ok());
        assert!(matches!(check_endpoint(""), Err(TallyError::Config(_))));
        assert!(matches!(
            check_endpoint("localhost:9515"),
            Err(TallyError::Config(msg)) if msg.contains("localhost:9515")
        ));
    }

    #[tokio::test]
    async fn malformed_endpoint_fails_before_connecting() {
        let options = DriverOptions {
            webdriver_url: "   ".to_string(),
            ..DriverOptions::default()
        };
        let err = TallyDriver::connect(&options).await.err();
        assert!(matches!(err, Some(TallyError::Config(_))));
    }
}
