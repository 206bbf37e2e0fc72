//! Minimal JSON HTTP client with safe logging, retries, and bearer auth.
//!
//! - Request options: bearer `Auth`, repeated query params, timeout, retries
//! - Redacts sensitive query params and never logs secret values
//! - Retries 429/5xx with exponential backoff and `Retry-After` support
//! - Optional *raw* request/response logging via `TALLY_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), tally_http::HttpError> {
//! let client = tally_http::HttpClient::new("https://sheets.googleapis.com/v4/")?;
//! let got: serde_json::Value = client
//!     .get_json("spreadsheets/abc/values/Answers!A2:A", tally_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! Security: `Auth::Bearer` values are sanitized before use, and logs only
//! ever include the auth kind, not the secret.

use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

const RAW_ENV: &str = "TALLY_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn is_secret_param(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "access_token"
            | "authorization"
            | "auth"
            | "key"
            | "api_key"
            | "token"
            | "secret"
            | "client_secret"
            | "bearer"
    )
}

/// Redact sensitive headers for logging
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let val = if key.eq_ignore_ascii_case("authorization") {
                "Bearer <redacted>".to_string()
            } else {
                v.to_str().unwrap_or("").to_string()
            };
            (key, val)
        })
        .collect()
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}")]
    Api { status: StatusCode, message: String },
}

impl HttpError {
    /// HTTP status for API errors, `None` for transport/build failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ==============================
// Auth & Request Options
// ==============================

/// How a request authenticates.
///
/// ```
/// use tally_http::Auth;
///
/// let bearer = Auth::Bearer("token");
/// assert_eq!(bearer.kind(), "bearer");
/// assert_eq!(Auth::None.kind(), "none");
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub enum Auth<'a> {
    /// Authorization: Bearer <token>
    Bearer(&'a str),
    #[default]
    None,
}

impl Auth<'_> {
    /// Label safe to log in place of the credential.
    pub fn kind(&self) -> &'static str {
        match self {
            Auth::Bearer(_) => "bearer",
            Auth::None => "none",
        }
    }
}

/// Per-request tuning knobs for the HTTP client.
///
/// Repeated query keys are sent in order, which is how batch endpoints take
/// several ranges.
///
/// ```
/// use tally_http::{Auth, RequestOpts};
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(1),
///     auth: Auth::Bearer("ya29.token"),
///     query: vec![("ranges", "Answers!A2:A".into()), ("ranges", "Answers!P2:P".into())],
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert_eq!(opts.query.len(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub auth: Auth<'a>,
    pub query: Vec<(&'a str, Cow<'a, str>)>,
}

/// Raw outcome of one round trip.
struct Exchange {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// Relative paths are joined onto the base, so the base should end in `/`.
    ///
    /// ```no_run
    /// use tally_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://sheets.googleapis.com/v4/")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
        })
    }

    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.call::<(), T>(Method::GET, path, None, opts).await
    }

    pub async fn post_json_opts<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call(Method::POST, path, Some(body), opts).await
    }

    pub async fn put_json_opts<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call(Method::PUT, path, Some(body), opts).await
    }

    fn resolve(&self, path: &str) -> Result<Url, HttpError> {
        self.base.join(path).map_err(|e| HttpError::Url(e.to_string()))
    }

    async fn exchange(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
        bearer: Option<&str>,
        opts: &RequestOpts<'_>,
        timeout: Duration,
    ) -> Result<Exchange, reqwest::Error> {
        let mut rb = self
            .inner
            .request(method.clone(), url.clone())
            .timeout(timeout);
        if !opts.query.is_empty() {
            let pairs: Vec<(&str, &str)> =
                opts.query.iter().map(|(k, v)| (*k, v.as_ref())).collect();
            rb = rb.query(&pairs);
        }
        if let Some(bytes) = body {
            rb = rb
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(bytes.to_vec());
        }
        if let Some(tok) = bearer {
            rb = rb.bearer_auth(tok);
        }

        let resp = rb.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?.to_vec();
        Ok(Exchange {
            status,
            headers,
            body,
        })
    }

    async fn call<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.resolve(path)?;
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        let bearer = match opts.auth {
            Auth::Bearer(tok) => Some(sanitize_token(tok)?),
            Auth::None => None,
        };
        let shown_query: Vec<(&str, &str)> = opts
            .query
            .iter()
            .map(|(k, v)| (*k, if is_secret_param(k) { "<redacted>" } else { v.as_ref() }))
            .collect();

        let req_id = format!("r{}", REQUEST_SEQ.fetch_add(1, Ordering::Relaxed));
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let mut attempt = 0usize;

        loop {
            tracing::debug!(
                req_id = %req_id,
                attempt = attempt + 1,
                method = %method,
                host_path = %format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
                query = ?shown_query,
                auth_kind = opts.auth.kind(),
                has_body = body.is_some(),
                "http.request.start"
            );
            if raw_enabled() {
                if let Some(bytes) = &body {
                    tracing::debug!(target: "http.raw", %req_id, body = %raw_text(bytes), "request");
                }
            }

            let started = std::time::Instant::now();
            let exchange = match self
                .exchange(&method, &url, body.as_deref(), bearer.as_deref(), &opts, timeout)
                .await
            {
                Ok(exchange) => exchange,
                Err(err) if attempt < max_retries => {
                    attempt += 1;
                    let delay = backoff(attempt);
                    tracing::warn!(
                        req_id = %req_id,
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        error = %err,
                        "http.retrying.network"
                    );
                    sleep(delay).await;
                    continue;
                }
                Err(err) => {
                    tracing::warn!(req_id = %req_id, attempt, error = %err, "http.network_error");
                    return Err(HttpError::Network(err.to_string()));
                }
            };
            let Exchange {
                status,
                headers,
                body: bytes,
            } = exchange;

            tracing::debug!(
                req_id = %req_id,
                %status,
                duration_ms = started.elapsed().as_millis() as u64,
                body_len = bytes.len(),
                "http.response"
            );
            if raw_enabled() {
                tracing::info!(
                    target: "http.raw",
                    %req_id,
                    %status,
                    headers = ?redact_headers(&headers),
                    body = %raw_text(&bytes)
                );
            }

            if status.is_success() {
                // An empty success body decodes as JSON null.
                let payload: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
                return serde_json::from_slice::<T>(payload).map_err(|e| {
                    let snippet = snip_body(&bytes);
                    tracing::warn!(req_id = %req_id, error = %e, body_snippet = %snippet, "http.decode_error");
                    HttpError::Decode(e.to_string(), snippet)
                });
            }

            let message = extract_error_message(&bytes);
            let throttled = status == StatusCode::TOO_MANY_REQUESTS;
            if (throttled || status.is_server_error()) && attempt < max_retries {
                attempt += 1;
                let delay = match retry_after_delay_secs(&headers) {
                    Some(secs) => Duration::from_secs(secs),
                    None if throttled => backoff(attempt).max(Duration::from_millis(1100)),
                    None => backoff(attempt),
                };
                tracing::warn!(
                    req_id = %req_id,
                    %status,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    %message,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(req_id = %req_id, %status, %message, "http.error");
            return Err(HttpError::Api { status, message });
        }
    }
}

// ==============================
// Helpers
// ==============================

fn backoff(attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(16) as u32;
    Duration::from_millis(200u64.saturating_mul(1u64 << shift))
}

/// Pull a human message out of common JSON error envelopes.
///
/// Google APIs answer `{"error":{"code":..,"message":"..","status":".."}}`;
/// flat `{"message":".."}` / `{"error":".."}` bodies are also understood.
fn extract_error_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: Detail,
    }
    #[derive(Deserialize)]
    struct Detail {
        message: String,
        #[serde(default)]
        status: String,
    }

    #[derive(Deserialize)]
    struct Flat {
        #[serde(default)]
        message: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(env) = serde_json::from_slice::<Envelope>(body) {
        if env.error.status.is_empty() {
            return env.error.message;
        }
        return format!("{} ({})", env.error.message, env.error.status);
    }
    if let Ok(flat) = serde_json::from_slice::<Flat>(body) {
        if !flat.message.is_empty() {
            return flat.message;
        }
        if !flat.error.is_empty() {
            return flat.error;
        }
    }
    snip_body(body)
}

fn retry_after_delay_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .parse()
        .ok()
}

fn raw_text(bytes: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(bytes).into_owned();
    if text.len() > RAW_MAX_BODY {
        let mut cut = RAW_MAX_BODY;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > 500 {
        let mut cut = 500;
        while !snip.is_char_boundary(cut) {
            cut -= 1;
        }
        snip.truncate(cut);
        snip.push_str("...");
    }
    snip
}

fn sanitize_token(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if s.is_empty() {
        return Err(HttpError::Build("bearer token is empty".into()));
    }
    if !s.is_ascii() {
        return Err(HttpError::Build("bearer token contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "bearer token contains control characters".into(),
        ));
    }
    HeaderValue::from_str(&format!("Bearer {s}"))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn google_error_envelope_is_summarised() {
        let body = br#"{"error":{"code":403,"message":"The caller does not have permission","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(
            extract_error_message(body),
            "The caller does not have permission (PERMISSION_DENIED)"
        );
    }

    #[test]
    fn token_is_trimmed_and_unquoted() {
        assert_eq!(sanitize_token(" \"ya29.abc\n\" ").unwrap(), "ya29.abc");
        assert!(sanitize_token("   ").is_err());
    }

    #[test]
    fn secret_params_are_detected() {
        assert!(is_secret_param("ACCESS_TOKEN"));
        assert!(!is_secret_param("valueInputOption"));
    }

    #[tokio::test]
    async fn get_json_sends_bearer_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/items"))
            .and(query_param("majorDimension", "ROWS"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(&format!("{}/v4/", server.uri())).unwrap();
        let got: Value = client
            .get_json(
                "items",
                RequestOpts {
                    auth: Auth::Bearer("tok"),
                    query: vec![("majorDimension", "ROWS".into())],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(got, json!({"ok": true}));
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_surface() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(json!({"message": "try later"})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = HttpClient::new(&server.uri()).unwrap().with_retries(1);
        let err = client
            .get_json::<Value>("flaky", RequestOpts::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert!(err.to_string().contains("try later"));
    }

    #[tokio::test]
    async fn throttled_requests_honour_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/batch"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/batch"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": 1})))
            .mount(&server)
            .await;

        let client = HttpClient::new(&server.uri()).unwrap().with_retries(1);
        let got: Value = client
            .post_json_opts("batch", &json!({"data": []}), RequestOpts::default())
            .await
            .unwrap();
        assert_eq!(got["done"], 1);
    }

    #[tokio::test]
    async fn empty_success_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/cell"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = HttpClient::new(&server.uri()).unwrap();
        let got: Value = client
            .put_json_opts("cell", &json!({"values": [["x"]]}), RequestOpts::default())
            .await
            .unwrap();
        assert_eq!(got, Value::Null);
    }
}
