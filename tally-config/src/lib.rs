//! Loader for `tally.yaml` with environment overlays.
//!
//! Sources are merged in order: `TALLY__`-prefixed environment variables
//! (`TALLY__SHEET__SPREADSHEET_ID=...`), then any files or inline YAML added to
//! the builder. After merging, every string value has `${VAR}` placeholders
//! expanded so secrets such as the Sheets access token or login password can
//! stay in the environment.
//!
//! Every section has defaults, so an empty document is a valid configuration.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tally_common::observability::{LogConfig, LogFormat};
use tally_common::{ScrapeSettings, StealthLevel, Timings};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    pub version: Option<String>,
    pub browser: BrowserConfig,
    pub scrape: ScrapeConfig,
    pub sheet: SheetConfig,
    pub login: LoginConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub stealth: StealthLevel,
    pub page_load_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".into(),
            headless: false,
            stealth: StealthLevel::Balanced,
            page_load_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub debug: bool,
    pub site_host: String,
    pub ready_timeout_secs: u64,
    pub settle_ms: u64,
    pub log_settle_ms: u64,
    pub return_settle_ms: u64,
    pub inter_request_min_ms: u64,
    pub inter_request_max_ms: u64,
    pub post_write_delay_ms: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            debug: false,
            site_host: "quora.com".into(),
            ready_timeout_secs: 15,
            settle_ms: 3000,
            log_settle_ms: 5000,
            return_settle_ms: 3000,
            inter_request_min_ms: 3000,
            inter_request_max_ms: 7000,
            post_write_delay_ms: 2000,
        }
    }
}

impl ScrapeConfig {
    /// Materialise the settings threaded through the extraction core.
    ///
    /// An inverted inter-request range is repaired by swapping its bounds.
    pub fn to_settings(&self) -> ScrapeSettings {
        let (lo, hi) = if self.inter_request_min_ms <= self.inter_request_max_ms {
            (self.inter_request_min_ms, self.inter_request_max_ms)
        } else {
            (self.inter_request_max_ms, self.inter_request_min_ms)
        };
        ScrapeSettings {
            debug: self.debug,
            site_host: self.site_host.clone(),
            timings: Timings {
                ready_timeout: Duration::from_secs(self.ready_timeout_secs),
                settle: Duration::from_millis(self.settle_ms),
                log_settle: Duration::from_millis(self.log_settle_ms),
                return_settle: Duration::from_millis(self.return_settle_ms),
                inter_request_min: Duration::from_millis(lo),
                inter_request_max: Duration::from_millis(hi),
                post_write_delay: Duration::from_millis(self.post_write_delay_ms),
            },
        }
    }
}

/// Where URLs are read from and results are written to.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub spreadsheet_id: Option<String>,
    pub sheet_name: String,
    pub url_range: String,
    pub max_urls: usize,
    pub access_token: Option<String>,
    pub api_base: String,
    pub code_sheet: String,
    pub code_attempts: u32,
    pub code_retry_secs: u64,
    pub columns: ColumnConfig,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            sheet_name: "Answers".into(),
            url_range: "A2:A".into(),
            max_urls: 200,
            access_token: None,
            api_base: "https://sheets.googleapis.com/v4/".into(),
            code_sheet: "Code".into(),
            code_attempts: 5,
            code_retry_secs: 20,
            columns: ColumnConfig::default(),
        }
    }
}

/// Column letters receiving each output field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub base_url: String,
    pub author: String,
    pub post_date: String,
    pub views: String,
    pub upvotes: String,
    pub comments: String,
    pub shares: String,
    pub scraped_at: String,
    pub processed: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            base_url: "B".into(),
            author: "G".into(),
            post_date: "H".into(),
            views: "I".into(),
            upvotes: "J".into(),
            comments: "K".into(),
            shares: "L".into(),
            scraped_at: "M".into(),
            processed: "P".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub enabled: bool,
    pub login_url: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub credentials_file: PathBuf,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            login_url: "https://www.quora.com/login".into(),
            email: None,
            password: None,
            credentials_file: PathBuf::from("credentials.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    pub stderr: bool,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            format: LogFormat::Text,
            stderr: true,
            filter: "info".into(),
        }
    }
}

impl LoggingConfig {
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            log_dir: self.dir.clone(),
            emit_stderr: self.stderr,
            format: self.format,
            default_filter: self.filter.clone(),
            ..LogConfig::default()
        }
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct TallyConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for TallyConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TallyConfigLoader {
    /// Start with `TALLY__` environment overrides only.
    ///
    /// ```
    /// use tally_config::TallyConfigLoader;
    ///
    /// let config = TallyConfigLoader::new()
    ///     .with_yaml_str("version: '1'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.sheet.sheet_name, "Answers");
    /// assert_eq!(config.sheet.max_urls, 200);
    /// ```
    pub fn new() -> Self {
        let builder =
            Config::builder().add_source(Environment::with_prefix("TALLY").separator("__"));
        Self { builder }
    }

    /// Attach a required YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent, so env-only deployments still load.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use tally_config::TallyConfigLoader;
    ///
    /// let cfg = TallyConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// sheet:
    ///   spreadsheet_id: "sheet-123"
    ///   max_urls: 10
    /// scrape:
    ///   debug: true
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.sheet.spreadsheet_id.as_deref(), Some("sheet-123"));
    /// assert_eq!(cfg.sheet.max_urls, 10);
    /// assert!(cfg.scrape.to_settings().debug);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// ```
    /// use tally_config::TallyConfigLoader;
    ///
    /// unsafe { std::env::set_var("SHEETS_TOKEN_DOC", "ya29.from-env"); }
    ///
    /// let config = TallyConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// sheet:
    ///   access_token: "${SHEETS_TOKEN_DOC}"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.sheet.access_token.as_deref(), Some("ya29.from-env"));
    ///
    /// unsafe { std::env::remove_var("SHEETS_TOKEN_DOC"); }
    /// ```
    pub fn load(self) -> Result<TallyConfig, ConfigError> {
        let cfg = self.builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("FOO", Some("bar"), || {
            let mut v = json!("prefix-${FOO}-suffix");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("prefix-bar-suffix"));
        });
    }

    #[test]
    fn expands_nested_sections() {
        temp_env::with_vars(
            [("LOGIN_MAIL", Some("me@example.com")), ("LOGIN_PW", Some("hunter2"))],
            || {
                let mut v = json!({
                    "login": { "email": "${LOGIN_MAIL}", "password": "$LOGIN_PW" },
                    "scrape": { "debug": true, "settle_ms": 10 }
                });
                expand_env_in_value(&mut v);
                assert_eq!(v["login"]["email"], json!("me@example.com"));
                assert_eq!(v["login"]["password"], json!("hunter2"));
                assert_eq!(v["scrape"]["settle_ms"], json!(10));
            },
        );
    }

    #[test]
    fn stops_on_cycles() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${DOES_NOT_EXIST_TALLY}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${DOES_NOT_EXIST_TALLY}"));
    }

    #[test]
    fn inverted_delay_range_is_swapped() {
        let cfg = ScrapeConfig {
            inter_request_min_ms: 9000,
            inter_request_max_ms: 1000,
            ..ScrapeConfig::default()
        };
        let timings = cfg.to_settings().timings;
        assert_eq!(timings.inter_request_min, Duration::from_millis(1000));
        assert_eq!(timings.inter_request_max, Duration::from_millis(9000));
    }
}
