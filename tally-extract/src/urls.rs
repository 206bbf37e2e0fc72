//! Pure URL derivations for answer pages.

use url::Url;

const ANSWER_MARKER: &str = "/answer/";

/// The thread an answer belongs to: the answer URL cut at `/answer/`.
///
/// Scheme, host, query and fragment are kept. URLs without the marker, or
/// that fail to parse, come back unchanged.
///
/// ```
/// use tally_extract::base_thread_url;
///
/// assert_eq!(
///     base_thread_url("https://x.com/Thread-Title/answer/Author-Name"),
///     "https://x.com/Thread-Title"
/// );
/// assert_eq!(base_thread_url("https://x.com/Thread-Title"), "https://x.com/Thread-Title");
/// ```
pub fn base_thread_url(answer_url: &str) -> String {
    let Ok(mut parsed) = Url::parse(answer_url) else {
        return answer_url.to_string();
    };
    let Some(cut) = parsed.path().find(ANSWER_MARKER) else {
        return answer_url.to_string();
    };
    let base_path = parsed.path()[..cut].to_string();
    parsed.set_path(&base_path);
    parsed.to_string()
}

/// Revision-history view of an answer.
///
/// `/log` goes on the end of the path, so share-link queries and fragments
/// stay behind it. A URL that already is a log view is returned unchanged.
/// Unparseable input gets `/log` appended textually.
///
/// ```
/// use tally_extract::log_url;
///
/// assert_eq!(
///     log_url("https://x.com/T/answer/A?ch=10&share=abc"),
///     "https://x.com/T/answer/A/log?ch=10&share=abc"
/// );
/// ```
pub fn log_url(answer_url: &str) -> String {
    let Ok(mut parsed) = Url::parse(answer_url) else {
        return if is_log_path(answer_url) {
            answer_url.to_string()
        } else {
            format!("{answer_url}/log")
        };
    };
    if is_log_path(parsed.path()) {
        return answer_url.to_string();
    }
    let log_path = format!("{}/log", parsed.path().trim_end_matches('/'));
    parsed.set_path(&log_path);
    parsed.to_string()
}

fn is_log_path(path: &str) -> bool {
    path.ends_with("/log") || path.contains("/log/")
}
