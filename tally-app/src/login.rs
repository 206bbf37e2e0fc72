//! Best-effort sign-in so revision logs are readable.
//!
//! Every step works through an ordered list of locators and gives up quietly
//! when none match. A failed login is reported to the caller, which carries
//! on scraping logged out.

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use std::time::Duration;
use tally_common::ScrapeSettings;
use tally_config::LoginConfig;
use tally_drivers::{FormInput, Locator};
use tally_sheets::CodeInbox;
use tracing::{debug, info, warn};
use url::Url;

use crate::credentials::{Credentials, mask_email};

const PROFILE_PATH: &str = "/profile/";

const EMAIL_FIELDS: [&str; 4] = [
    "//input[@id='email']",
    "//input[@type='email']",
    "//input[@name='email']",
    "//input[@placeholder='Email']",
];

const PASSWORD_FIELDS: [&str; 4] = [
    "//input[@id='password']",
    "//input[@type='password']",
    "//input[@name='password']",
    "//input[@placeholder='Password']",
];

const SUBMIT_BUTTONS: [&str; 7] = [
    "//button[@type='submit']",
    "//button[contains(text(), 'Log In')]",
    "//button[contains(text(), 'Login')]",
    "//button[contains(@class, 'submit')]",
    "//input[@type='submit']",
    "//div[contains(@class, 'submit')]",
    "//div[contains(text(), 'Log in')][@role='button']",
];

const VERIFICATION_FIELDS: [&str; 5] = [
    "//input[contains(@placeholder, 'code')]",
    "//input[contains(@placeholder, 'verification')]",
    "//input[contains(@aria-label, 'code')]",
    "//div[contains(text(), 'verification code')]//following::input",
    "//div[contains(text(), 'code')]//following::input",
];

const VERIFICATION_TEXT: [&str; 6] = [
    "verification code",
    "security code",
    "2-step verification",
    "enter the code",
    "code we sent",
    "code below",
];

const GENERIC_INPUT: &str =
    "//input[not(@type='hidden') and not(@type='password') and not(@type='email')]";

const VERIFY_BUTTONS: [&str; 4] = [
    "//button[@type='submit']",
    "//button[contains(text(), 'Verify')]",
    "//button[contains(text(), 'Continue')]",
    "//button[contains(text(), 'Submit')]",
];

const PROFILE_MARKERS: &str = "//div[contains(@class, 'q-text') and (contains(text(), 'Followers') or contains(text(), 'Following'))] | //div[contains(text(), 'Edit Profile')] | //div[contains(@aria-label, 'Your profile') or contains(@aria-label, 'Your content')]";

const LOGIN_BUTTON: &str = "//button[contains(text(), 'Login') or contains(text(), 'Log In')]";

/// `arguments[0]` is the field kind (`email` or `password`), `arguments[1]` the value.
const FILL_SCRIPT: &str = r#"
const kind = arguments[0];
for (const input of document.querySelectorAll('input')) {
    const placeholder = (input.placeholder || '').toLowerCase();
    if (input.type === kind || input.id === kind || input.name === kind || placeholder.includes(kind)) {
        input.value = arguments[1];
        input.dispatchEvent(new Event('input', { bubbles: true }));
        return true;
    }
}
return false;
"#;

const SUBMIT_SCRIPTS: [&str; 2] = [
    r#"
const form = document.querySelector('form');
if (!form) return false;
form.submit();
return true;
"#,
    r#"
for (const button of document.querySelectorAll('button')) {
    const text = button.textContent.toLowerCase();
    if (button.type === 'submit' || text.includes('log') || button.className.includes('submit')) {
        button.click();
        return true;
    }
}
return false;
"#,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    AlreadyLoggedIn,
    LoggedIn,
    Failed(String),
}

impl LoginOutcome {
    pub fn is_signed_in(&self) -> bool {
        !matches!(self, LoginOutcome::Failed(_))
    }
}

async fn pause(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}

/// Sign in with `creds`, consulting `inbox` if a verification code is requested.
pub async fn login(
    page: &dyn FormInput,
    creds: &Credentials,
    cfg: &LoginConfig,
    inbox: Option<&dyn CodeInbox>,
    settings: &ScrapeSettings,
) -> LoginOutcome {
    let outcome = match attempt(page, creds, cfg, inbox, settings).await {
        Ok(outcome) => outcome,
        Err(err) => LoginOutcome::Failed(format!("{err:#}")),
    };
    match &outcome {
        LoginOutcome::Failed(reason) => warn!(
            target: "app.login",
            %reason,
            "login failed; continuing logged out, revision-log dates fall back to the answer page"
        ),
        other => info!(target: "app.login", outcome = ?other, "signed in"),
    }
    outcome
}

async fn attempt(
    page: &dyn FormInput,
    creds: &Credentials,
    cfg: &LoginConfig,
    inbox: Option<&dyn CodeInbox>,
    settings: &ScrapeSettings,
) -> Result<LoginOutcome> {
    let timings = &settings.timings;
    info!(target: "app.login", email = %mask_email(&creds.email), url = %cfg.login_url, "logging in");
    page.navigate(&cfg.login_url)
        .await
        .context("opening login page")?;
    pause(timings.settle).await;

    if page.current_url().await?.contains(PROFILE_PATH) {
        return Ok(LoginOutcome::AlreadyLoggedIn);
    }

    if !fill(page, &EMAIL_FIELDS, "email", &creds.email).await {
        return Ok(LoginOutcome::Failed("email field not found".into()));
    }
    if !fill(page, &PASSWORD_FIELDS, "password", &creds.password).await {
        return Ok(LoginOutcome::Failed("password field not found".into()));
    }
    if !submit(page).await {
        warn!(target: "app.login", "no submit control responded");
    }
    pause(timings.log_settle).await;

    if let Some(field) = verification_field(page, settings).await {
        info!(target: "app.login", field = %field, "verification code requested");
        let Some(inbox) = inbox else {
            return Ok(LoginOutcome::Failed(
                "verification code required but no code inbox is configured".into(),
            ));
        };
        match inbox.verification_code().await {
            Ok(Some(code)) => enter_code(page, &field, &code).await?,
            Ok(None) => return Ok(LoginOutcome::Failed("no verification code arrived".into())),
            Err(err) => return Ok(LoginOutcome::Failed(format!("code inbox unavailable: {err}"))),
        }
        pause(timings.log_settle).await;
    }

    if confirm_session(page, cfg, settings).await? {
        Ok(LoginOutcome::LoggedIn)
    } else {
        Ok(LoginOutcome::Failed("session not established".into()))
    }
}

async fn fill(page: &dyn FormInput, fields: &[&str], kind: &str, value: &str) -> bool {
    for path in fields {
        match page.type_into(&Locator::xpath(*path), value).await {
            Ok(true) => {
                debug!(target: "app.login", kind, locator = path, "field filled");
                return true;
            }
            Ok(false) => {}
            Err(err) => debug!(target: "app.login", kind, locator = path, error = %err, "field rejected input"),
        }
    }
    match page
        .evaluate_script(FILL_SCRIPT, vec![json!(kind), json!(value)])
        .await
    {
        Ok(Value::Bool(true)) => {
            debug!(target: "app.login", kind, "field filled by script");
            true
        }
        Ok(_) => false,
        Err(err) => {
            debug!(target: "app.login", kind, error = %err, "fill script failed");
            false
        }
    }
}

async fn submit(page: &dyn FormInput) -> bool {
    for path in SUBMIT_BUTTONS {
        if let Ok(true) = page.click(&Locator::xpath(path)).await {
            debug!(target: "app.login", locator = path, "submit clicked");
            return true;
        }
    }
    for path in PASSWORD_FIELDS {
        if let Ok(true) = page.press_enter(&Locator::xpath(path)).await {
            debug!(target: "app.login", "submitted with enter");
            return true;
        }
    }
    for script in SUBMIT_SCRIPTS {
        if let Ok(Value::Bool(true)) = page.evaluate_script(script, vec![]).await {
            debug!(target: "app.login", "submitted by script");
            return true;
        }
    }
    false
}

async fn verification_field(page: &dyn FormInput, settings: &ScrapeSettings) -> Option<Locator> {
    let short_wait = settings.timings.ready_timeout.min(Duration::from_secs(3));
    for path in VERIFICATION_FIELDS {
        let locator = Locator::xpath(path);
        if page.wait_for(&locator, short_wait).await.is_ok() {
            return Some(locator);
        }
    }

    let text = page.page_source().await.ok()?.to_lowercase();
    let indicator = VERIFICATION_TEXT.iter().find(|i| text.contains(*i))?;
    debug!(target: "app.login", indicator, "verification prompt detected from page text");
    let generic = Locator::xpath(GENERIC_INPUT);
    match page.wait_for(&generic, short_wait).await {
        Ok(()) => Some(generic),
        Err(_) => {
            warn!(target: "app.login", "verification prompt shown but no input field found");
            None
        }
    }
}

async fn enter_code(page: &dyn FormInput, field: &Locator, code: &str) -> Result<()> {
    if !page.type_into(field, code).await? {
        bail!("verification field {field} disappeared");
    }
    if let Ok(true) = page.press_enter(field).await {
        return Ok(());
    }
    for path in VERIFY_BUTTONS {
        if let Ok(true) = page.click(&Locator::xpath(path)).await {
            return Ok(());
        }
    }
    warn!(target: "app.login", "verification code typed but could not be submitted");
    Ok(())
}

async fn confirm_session(
    page: &dyn FormInput,
    cfg: &LoginConfig,
    settings: &ScrapeSettings,
) -> Result<bool> {
    let base = Url::parse(&cfg.login_url).context("parsing login url")?;
    let settle = settings.timings.settle;

    let mut signed_in = page.current_url().await?.contains(PROFILE_PATH);
    if !signed_in {
        page.navigate(base.join("/profile")?.as_str()).await?;
        pause(settle).await;
        signed_in = page.current_url().await?.contains(PROFILE_PATH)
            || !page
                .element_texts(&Locator::xpath(PROFILE_MARKERS))
                .await
                .unwrap_or_default()
                .is_empty();
    }
    if !signed_in {
        let notifications = base.join("/notifications")?;
        page.navigate(notifications.as_str()).await?;
        pause(settle).await;
        signed_in = page.current_url().await?.contains("/notifications");
    }
    if !signed_in {
        return Ok(false);
    }

    if !page
        .element_texts(&Locator::xpath(LOGIN_BUTTON))
        .await
        .unwrap_or_default()
        .is_empty()
    {
        debug!(target: "app.login", "login button still present");
        return Ok(false);
    }

    page.navigate(base.join("/")?.as_str()).await?;
    pause(settle).await;
    let landed = page.current_url().await?;
    Ok(!landed.to_lowercase().contains("login"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use tally_common::Timings;
    use tally_drivers::PageRenderer;
    use tally_sheets::SheetError;

    const LOGIN_URL: &str = "https://www.quora.com/login";

    #[derive(Default)]
    struct FakeForm {
        routes: HashMap<String, String>,
        present: HashSet<String>,
        texts: HashMap<String, Vec<String>>,
        source: String,
        current: Mutex<String>,
        typed: Mutex<Vec<(String, String)>>,
        entered: Mutex<Vec<String>>,
    }

    impl FakeForm {
        fn route(mut self, from: &str, to: &str) -> Self {
            self.routes.insert(from.into(), to.into());
            self
        }

        fn with(mut self, path: &str) -> Self {
            self.present.insert(path.into());
            self
        }

        fn typed(&self) -> Vec<(String, String)> {
            self.typed.lock().unwrap().clone()
        }
    }

    fn query(locator: &Locator) -> String {
        match locator {
            Locator::Css(s) | Locator::XPath(s) => s.clone(),
        }
    }

    #[async_trait]
    impl PageRenderer for FakeForm {
        async fn navigate(&self, url: &str) -> Result<()> {
            let landed = self.routes.get(url).cloned().unwrap_or_else(|| url.to_string());
            *self.current.lock().unwrap() = landed;
            Ok(())
        }

        async fn current_url(&self) -> Result<String> {
            Ok(self.current.lock().unwrap().clone())
        }

        async fn page_source(&self) -> Result<String> {
            Ok(self.source.clone())
        }

        async fn element_texts(&self, locator: &Locator) -> Result<Vec<String>> {
            Ok(self.texts.get(&query(locator)).cloned().unwrap_or_default())
        }

        async fn element_attributes(&self, _: &Locator, _: &str) -> Result<Vec<Option<String>>> {
            Ok(vec![])
        }

        async fn evaluate_script(&self, _: &str, _: Vec<Value>) -> Result<Value> {
            Ok(Value::Bool(false))
        }

        async fn wait_for(&self, locator: &Locator, _: Duration) -> Result<()> {
            if self.present.contains(&query(locator)) {
                Ok(())
            } else {
                bail!("{locator} absent")
            }
        }
    }

    #[async_trait]
    impl FormInput for FakeForm {
        async fn type_into(&self, locator: &Locator, text: &str) -> Result<bool> {
            let q = query(locator);
            if !self.present.contains(&q) {
                return Ok(false);
            }
            self.typed.lock().unwrap().push((q, text.to_string()));
            Ok(true)
        }

        async fn click(&self, locator: &Locator) -> Result<bool> {
            Ok(self.present.contains(&query(locator)))
        }

        async fn press_enter(&self, locator: &Locator) -> Result<bool> {
            let q = query(locator);
            let hit = self.present.contains(&q);
            if hit {
                self.entered.lock().unwrap().push(q);
            }
            Ok(hit)
        }
    }

    struct Inbox(Option<&'static str>);

    #[async_trait]
    impl CodeInbox for Inbox {
        async fn verification_code(&self) -> std::result::Result<Option<String>, SheetError> {
            Ok(self.0.map(str::to_string))
        }
    }

    fn settings() -> ScrapeSettings {
        ScrapeSettings {
            timings: Timings::immediate(),
            ..ScrapeSettings::default()
        }
    }

    fn creds() -> Credentials {
        Credentials {
            email: "someone@example.com".into(),
            password: "pw".into(),
        }
    }

    fn login_form() -> FakeForm {
        FakeForm::default()
            .with("//input[@type='email']")
            .with("//input[@id='password']")
            .with("//button[@type='submit']")
    }

    #[tokio::test]
    async fn existing_session_is_detected() {
        let page = FakeForm::default().route(LOGIN_URL, "https://www.quora.com/profile/Jane-Doe");
        let outcome = login(&page, &creds(), &LoginConfig::default(), None, &settings()).await;
        assert_eq!(outcome, LoginOutcome::AlreadyLoggedIn);
        assert!(page.typed().is_empty());
    }

    #[tokio::test]
    async fn verification_code_is_fetched_and_submitted() {
        let page = login_form()
            .with("//input[contains(@placeholder, 'code')]")
            .route("https://www.quora.com/profile", "https://www.quora.com/profile/Jane-Doe");
        let inbox = Inbox(Some("482913"));

        let outcome = login(&page, &creds(), &LoginConfig::default(), Some(&inbox), &settings()).await;

        assert_eq!(outcome, LoginOutcome::LoggedIn);
        let typed = page.typed();
        assert_eq!(typed[0], ("//input[@type='email']".into(), "someone@example.com".into()));
        assert_eq!(typed[1], ("//input[@id='password']".into(), "pw".into()));
        assert_eq!(
            typed[2],
            ("//input[contains(@placeholder, 'code')]".into(), "482913".into())
        );
        assert_eq!(
            page.entered.lock().unwrap().as_slice(),
            ["//input[contains(@placeholder, 'code')]"]
        );
    }

    #[tokio::test]
    async fn missing_email_field_fails_softly() {
        let page = FakeForm::default();
        let outcome = login(&page, &creds(), &LoginConfig::default(), None, &settings()).await;
        assert_eq!(outcome, LoginOutcome::Failed("email field not found".into()));
        assert!(!outcome.is_signed_in());
    }

    #[tokio::test]
    async fn text_prompt_without_code_fails() {
        let mut page = login_form().with(GENERIC_INPUT);
        page.source = "<p>Enter the code we sent to your email</p>".into();
        let outcome = login(&page, &creds(), &LoginConfig::default(), Some(&Inbox(None)), &settings()).await;
        assert_eq!(outcome, LoginOutcome::Failed("no verification code arrived".into()));
    }

    #[tokio::test]
    async fn redirect_back_to_login_is_not_a_session() {
        let page = login_form()
            .route("https://www.quora.com/profile", "https://www.quora.com/profile/Jane-Doe")
            .route("https://www.quora.com/", "https://www.quora.com/login?next=%2F");
        let outcome = login(&page, &creds(), &LoginConfig::default(), None, &settings()).await;
        assert_eq!(outcome, LoginOutcome::Failed("session not established".into()));
    }
}
