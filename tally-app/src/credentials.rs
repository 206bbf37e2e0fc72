//! Login credentials from configuration, the environment, or a JSON file.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tally_config::LoginConfig;
use tracing::{debug, info, warn};

const EMAIL_ENV: &str = "QUORA_EMAIL";
const PASSWORD_ENV: &str = "QUORA_PASSWORD";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &mask_email(&self.email))
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    fn from_parts(email: Option<String>, password: Option<String>) -> Option<Self> {
        match (email, password) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Some(Self {
                    email: email.trim().to_string(),
                    password,
                })
            }
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct Pair {
    user_email: Option<String>,
    user_password: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CredentialsFile {
    Nested { quora_login: Pair },
    Flat(Pair),
}

/// Email with all but the first and last three characters starred.
pub fn mask_email(email: &str) -> String {
    let chars: Vec<char> = email.chars().collect();
    if chars.len() <= 6 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 6))
}

/// Parse either `{"quora_login": {...}}` or a flat `{user_email, user_password}` document.
pub fn parse_credentials(json: &str) -> Option<Credentials> {
    let pair = match serde_json::from_str::<CredentialsFile>(json).ok()? {
        CredentialsFile::Nested { quora_login } => quora_login,
        CredentialsFile::Flat(pair) => pair,
    };
    Credentials::from_parts(pair.user_email, pair.user_password)
}

fn candidate_paths(file: &Path) -> Vec<PathBuf> {
    let mut paths = vec![file.to_path_buf(), Path::new("..").join(file)];
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(PathBuf::from(home).join(file));
    }
    paths
}

/// First complete credential pair found, or `None` to run logged out.
///
/// Order: configuration, then `QUORA_EMAIL`/`QUORA_PASSWORD`, then the
/// credentials file in the working directory, its parent, and `$HOME`.
pub fn find_credentials(cfg: &LoginConfig) -> Option<Credentials> {
    if let Some(creds) = Credentials::from_parts(cfg.email.clone(), cfg.password.clone()) {
        info!(target: "app.login", source = "config", "using login credentials");
        return Some(creds);
    }
    if let Some(creds) =
        Credentials::from_parts(std::env::var(EMAIL_ENV).ok(), std::env::var(PASSWORD_ENV).ok())
    {
        info!(target: "app.login", source = "environment", "using login credentials");
        return Some(creds);
    }
    for path in candidate_paths(&cfg.credentials_file) {
        let Ok(text) = fs::read_to_string(&path) else {
            debug!(target: "app.login", path = %path.display(), "no credentials file");
            continue;
        };
        match parse_credentials(&text) {
            Some(creds) => {
                info!(target: "app.login", path = %path.display(), "using login credentials");
                return Some(creds);
            }
            None => warn!(target: "app.login", path = %path.display(), "credentials file has no usable login"),
        }
    }
    info!(target: "app.login", "no login credentials found");
    None
}
