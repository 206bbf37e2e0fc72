use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tally_common::OutputFormat;
use tally_config::TallyConfig;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputArg {
    Text,
    Json,
}

impl From<OutputArg> for OutputFormat {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Text => OutputFormat::Text,
            OutputArg::Json => OutputFormat::Json,
        }
    }
}

/// Scrape answer statistics into a spreadsheet.
#[derive(Debug, Parser)]
#[command(name = "tally", version)]
pub struct Cli {
    /// Configuration file. Without one, `tally.yaml` is read if present.
    #[arg(long, short, env = "TALLY_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub spreadsheet_id: Option<String>,

    #[arg(long)]
    pub sheet_name: Option<String>,

    /// A1 range holding answer URLs, e.g. `A2:A`.
    #[arg(long)]
    pub url_range: Option<String>,

    /// Stop after this many pending rows (0 means no cap).
    #[arg(long)]
    pub max_urls: Option<usize>,

    /// Narrate every declined extraction strategy.
    #[arg(long)]
    pub debug: bool,

    #[arg(long)]
    pub headless: bool,

    /// Skip the login flow.
    #[arg(long)]
    pub no_login: bool,

    #[arg(long)]
    pub credentials_file: Option<PathBuf>,

    /// Scrape one answer and print it; nothing is written to the sheet.
    #[arg(long)]
    pub url: Option<String>,

    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputArg,
}

impl Cli {
    /// Fold command-line overrides into the loaded configuration.
    pub fn apply(&self, cfg: &mut TallyConfig) {
        if let Some(id) = &self.spreadsheet_id {
            cfg.sheet.spreadsheet_id = Some(id.clone());
        }
        if let Some(name) = &self.sheet_name {
            cfg.sheet.sheet_name = name.clone();
        }
        if let Some(range) = &self.url_range {
            cfg.sheet.url_range = range.clone();
        }
        if let Some(max) = self.max_urls {
            cfg.sheet.max_urls = max;
        }
        if let Some(path) = &self.credentials_file {
            cfg.login.credentials_file = path.clone();
        }
        cfg.scrape.debug |= self.debug;
        cfg.browser.headless |= self.headless;
        if self.no_login {
            cfg.login.enabled = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "tally",
            "--spreadsheet-id",
            "sheet-9",
            "--max-urls",
            "5",
            "--debug",
            "--no-login",
            "--url-range",
            "A1:A",
        ]);
        let mut cfg = TallyConfig::default();
        cli.apply(&mut cfg);
        assert_eq!(cfg.sheet.spreadsheet_id.as_deref(), Some("sheet-9"));
        assert_eq!(cfg.sheet.max_urls, 5);
        assert_eq!(cfg.sheet.url_range, "A1:A");
        assert!(cfg.scrape.debug);
        assert!(!cfg.login.enabled);
        assert!(!cfg.browser.headless);
    }

    #[test]
    fn single_url_mode_with_json_output() {
        let cli = Cli::parse_from([
            "tally",
            "--url",
            "https://www.quora.com/Q/answer/A",
            "--output",
            "json",
        ]);
        assert_eq!(cli.url.as_deref(), Some("https://www.quora.com/Q/answer/A"));
        assert_eq!(OutputFormat::from(cli.output), OutputFormat::Json);
    }

    #[test]
    fn absent_flags_leave_config_alone() {
        let cli = Cli::parse_from(["tally"]);
        let mut cfg = TallyConfig::default();
        cli.apply(&mut cfg);
        assert_eq!(cfg.sheet.max_urls, 200);
        assert!(cfg.login.enabled);
    }
}
