use crate::renderer::{FormInput, Locator, PageRenderer};
use crate::tally_browser::{
    behavioral::BehavioralEngine,
    fingerprint::UserAgentProfile,
    stealth::{StealthProfile, StealthScripts},
};
use anyhow::Result;
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::Client;
use serde_json::Value;
use std::time::Duration;
use tally_common::TallyError;
use tracing::debug;

/// WebDriver key code for Enter.
const ENTER_KEY: &str = "\u{E007}";

fn wd_locator(locator: &Locator) -> fantoccini::Locator<'_> {
    match locator {
        Locator::Css(s) => fantoccini::Locator::Css(s),
        Locator::XPath(s) => fantoccini::Locator::XPath(s),
    }
}

/// [`PageRenderer`] over a live `fantoccini` session.
pub struct TallyPage {
    pub(crate) client: Client,
    pub(crate) stealth_profile: StealthProfile,
    pub(crate) user_agent: UserAgentProfile,
    pub(crate) behavioral_engine: BehavioralEngine,
}

impl TallyPage {
    /// Construct a page wrapper around an existing WebDriver client.
    pub fn new(
        client: Client,
        stealth_profile: StealthProfile,
        user_agent: UserAgentProfile,
        behavioral_engine: BehavioralEngine,
    ) -> Self {
        Self {
            client,
            stealth_profile,
            user_agent,
            behavioral_engine,
        }
    }

    /// Apply stealth scripts and basic fingerprinting adjustments.
    async fn apply_stealth_and_fingerprint(&self) -> Result<()> {
        self.client
            .execute(StealthScripts::get_core_evasions(), vec![])
            .await?;

        match self.stealth_profile {
            StealthProfile::Lightweight => {}
            StealthProfile::Balanced => {
                self.client
                    .execute(StealthScripts::get_canvas_evasions(), vec![])
                    .await?;
            }
            StealthProfile::Maximum => {
                self.client
                    .execute(StealthScripts::get_canvas_evasions(), vec![])
                    .await?;
                self.client
                    .execute(StealthScripts::get_webgl_evasions(), vec![])
                    .await?;
                self.client
                    .execute(
                        &StealthScripts::platform_override(&self.user_agent.platform),
                        vec![],
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn first(&self, locator: &Locator) -> Result<Option<Element>> {
        let mut found = self.client.find_all(wd_locator(locator)).await?;
        if found.is_empty() {
            return Ok(None);
        }
        Ok(Some(found.swap_remove(0)))
    }
}

#[async_trait]
impl PageRenderer for TallyPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.behavioral_engine.random_delay(300, 1200).await;
        self.client
            .goto(url)
            .await
            .map_err(|err| TallyError::Navigation {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
        // Evasions are best effort; a page that blocks them is still readable.
        if let Err(err) = self.apply_stealth_and_fingerprint().await {
            debug!(target: "browser.page", %url, error = %err, "stealth scripts not applied");
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn page_source(&self) -> Result<String> {
        self.client.source().await.map_err(anyhow::Error::from)
    }

    async fn element_texts(&self, locator: &Locator) -> Result<Vec<String>> {
        let elements = self.client.find_all(wd_locator(locator)).await?;
        let mut texts = Vec::with_capacity(elements.len());
        for element in elements {
            match element.text().await {
                Ok(text) => texts.push(text),
                // Nodes can detach while client-side rendering settles.
                Err(CmdError::Standard(err)) => {
                    debug!(target: "browser.page", %locator, error = %err, "skipping stale element");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(texts)
    }

    async fn element_attributes(
        &self,
        locator: &Locator,
        name: &str,
    ) -> Result<Vec<Option<String>>> {
        let elements = self.client.find_all(wd_locator(locator)).await?;
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            values.push(element.attr(name).await?);
        }
        Ok(values)
    }

    async fn evaluate_script(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.client
            .execute(script, args)
            .await
            .map_err(anyhow::Error::from)
    }

    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        match self
            .client
            .wait()
            .at_most(timeout)
            .for_element(wd_locator(locator))
            .await
        {
            Ok(_) => Ok(()),
            Err(CmdError::WaitTimeout) => Err(TallyError::Timeout.into()),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl FormInput for TallyPage {
    async fn type_into(&self, locator: &Locator, text: &str) -> Result<bool> {
        let Some(element) = self.first(locator).await? else {
            return Ok(false);
        };
        element.clear().await?;
        self.behavioral_engine
            .type_text_human_like(&element, text)
            .await?;
        Ok(true)
    }

    async fn click(&self, locator: &Locator) -> Result<bool> {
        let Some(element) = self.first(locator).await? else {
            return Ok(false);
        };
        self.behavioral_engine.random_delay(100, 400).await;
        element.click().await?;
        Ok(true)
    }

    async fn press_enter(&self, locator: &Locator) -> Result<bool> {
        let Some(element) = self.first(locator).await? else {
            return Ok(false);
        };
        element.send_keys(ENTER_KEY).await?;
        Ok(true)
    }
}
