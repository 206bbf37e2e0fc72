use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tally_common::observability::init_logging;
use tally_common::{OutputFormat, ScrapeSettings};
use tally_config::{BrowserConfig, TallyConfig, TallyConfigLoader};
use tally_drivers::tally_browser::behavioral::BehavioralEngine;
use tally_drivers::tally_browser::driver::{DriverOptions, TallyDriver};
use tally_drivers::tally_browser::page::TallyPage;
use tally_drivers::tally_browser::stealth::StealthProfile;
use tally_extract::scrape_answer;
use tally_sheets::{AnswerSheet, CodeInbox, SheetsClient, UrlRow};
use tracing::{debug, info, warn};

use cli::Cli;
use credentials::find_credentials;
use login::login;
use runner::{render_record, run_rows};

mod cli;
mod credentials;
mod login;
mod runner;

enum Mode {
    Single { url: String, format: OutputFormat },
    Sheet { client: SheetsClient, rows: Vec<UrlRow> },
}

fn driver_options(cfg: &BrowserConfig) -> DriverOptions {
    DriverOptions {
        webdriver_url: cfg.webdriver_url.clone(),
        headless: cfg.headless,
        stealth: StealthProfile::from(cfg.stealth),
        page_load_timeout: Duration::from_secs(cfg.page_load_timeout_secs),
    }
}

fn load_config(cli: &Cli) -> Result<TallyConfig> {
    let loader = match &cli.config {
        Some(path) => TallyConfigLoader::new().with_file(path),
        None => TallyConfigLoader::new().with_optional_file("tally.yaml"),
    };
    let mut cfg = loader.load().context("loading configuration")?;
    cli.apply(&mut cfg);
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli)?;

    let log_path = init_logging(cfg.logging.to_log_config())?;
    info!(target: "app", version = env!("CARGO_PKG_VERSION"), log = %log_path.display(), "tally starting");

    let settings = cfg.scrape.to_settings();

    // Rows are read before the browser starts so an empty sheet costs nothing.
    let mode = match &cli.url {
        Some(url) => Mode::Single {
            url: url.trim().to_string(),
            format: cli.output.into(),
        },
        None => {
            let client = SheetsClient::from_config(&cfg.sheet)?;
            let rows = client.pending_rows(cfg.sheet.max_urls).await?;
            if rows.is_empty() {
                info!(target: "app", "no pending rows; nothing to do");
                return Ok(());
            }
            Mode::Sheet { client, rows }
        }
    };

    let mut driver = TallyDriver::connect(&driver_options(&cfg.browser)).await?;
    let page = driver.page();
    let behavior = driver.behavioral_engine.clone();

    let outcome = tokio::select! {
        res = session(&page, &cfg, &settings, mode, &behavior) => res,
        _ = tokio::signal::ctrl_c() => {
            warn!(target: "app", "interrupted; shutting down");
            Ok(())
        }
    };

    if let Err(err) = driver.close().await {
        warn!(target: "app", error = %err, "browser session did not close cleanly");
    }
    outcome
}

async fn session(
    page: &TallyPage,
    cfg: &TallyConfig,
    settings: &ScrapeSettings,
    mode: Mode,
    behavior: &BehavioralEngine,
) -> Result<()> {
    // Single-URL mode still uses the sheet as a code inbox when one is configured.
    let inbox = match &mode {
        Mode::Sheet { client, .. } => Some(client.clone()),
        Mode::Single { .. } => SheetsClient::from_config(&cfg.sheet)
            .inspect_err(|err| debug!(target: "app", error = %err, "no code inbox"))
            .ok(),
    };

    if cfg.login.enabled {
        match find_credentials(&cfg.login) {
            Some(creds) => {
                login(
                    page,
                    &creds,
                    &cfg.login,
                    inbox.as_ref().map(|c| c as &dyn CodeInbox),
                    settings,
                )
                .await;
            }
            None => info!(target: "app", "scraping logged out"),
        }
    }

    match mode {
        Mode::Single { url, format } => {
            let record = scrape_answer(page, &url, settings).await;
            print!("{}", render_record(&record, format)?);
            if format == OutputFormat::Json {
                println!();
            }
        }
        Mode::Sheet { client, rows } => {
            info!(target: "app", pending = rows.len(), "starting sheet run");
            let report = run_rows(page, &client, rows, settings, behavior).await;
            report.log_summary();
        }
    }
    Ok(())
}
