//! Failure classification.
//!
//! [`classify`] is a pure function of the failure signal (status code and
//! message). It never looks at attempt history, so the backoff table can be
//! tested on its own.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Coarse failure taxonomy driving the backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimited,
    Forbidden,
    TlsError,
    Timeout,
    NetworkError,
    Unknown,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::RateLimited,
        ErrorKind::Forbidden,
        ErrorKind::TlsError,
        ErrorKind::Timeout,
        ErrorKind::NetworkError,
        ErrorKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::TlsError => "tls_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A raw failure mapped onto [`ErrorKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_status: Option<u16>,
}

const TLS_MARKERS: &[&str] = &[
    "certificate",
    "ssl",
    "tls",
    "x509",
    "self signed",
    "self-signed",
    "unknown issuer",
];

const TIMEOUT_MARKERS: &[&str] = &["timed out", "timeout", "deadline"];

const NETWORK_MARKERS: &[&str] = &[
    "dns",
    "connection refused",
    "connection reset",
    "connection closed",
    "connection failed",
    "failed to connect",
    "error trying to connect",
    "unreachable",
    "name or service not known",
    "failed to lookup address",
    "broken pipe",
];

/// Map a raw failure onto the taxonomy. Rules are evaluated in order; the
/// first match wins.
pub fn classify(error: &AppError) -> ClassifiedError {
    let message = error.to_string();
    let status = error.status_code();
    // Markers are only looked for outside URLs, so a host like
    // `openssl.org` or a query like `?page=429` carries no signal.
    let signal = strip_urls(&message);
    let lower = signal.to_lowercase();

    let kind = if status == Some(429)
        || has_status_token(&signal, "429")
        || lower.contains("too many requests")
    {
        ErrorKind::RateLimited
    } else if status == Some(403) || has_status_token(&signal, "403") || lower.contains("forbidden")
    {
        ErrorKind::Forbidden
    } else if contains_any(&lower, TLS_MARKERS) {
        ErrorKind::TlsError
    } else if matches!(error, AppError::Timeout(_)) || contains_any(&lower, TIMEOUT_MARKERS) {
        ErrorKind::Timeout
    } else if matches!(error, AppError::NetworkError(_)) || contains_any(&lower, NETWORK_MARKERS)
    {
        ErrorKind::NetworkError
    } else {
        ErrorKind::Unknown
    };

    ClassifiedError {
        kind,
        message,
        source_status: status,
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// `message` with every `http://` / `https://` span replaced by `<url>`.
///
/// A span ends at whitespace or at a closing quote or bracket, which covers
/// reqwest's `for url (https://...)` and the `for url 'https://...'` form.
fn strip_urls(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut rest = message;

    while let Some(start) = find_url_start(rest) {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let end = tail
            .find(|c: char| c.is_whitespace() || matches!(c, ')' | '\'' | '"' | '>' | ']'))
            .unwrap_or(tail.len());
        out.push_str("<url>");
        rest = &tail[end..];
    }
    out.push_str(rest);
    out
}

fn find_url_start(text: &str) -> Option<usize> {
    let lower = text.to_ascii_lowercase();
    match (lower.find("http://"), lower.find("https://")) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// True if `code` appears in `message` as a standalone number, e.g.
/// "HTTP 429" or "'429 Too Many Requests'", but not "/article/14290" or
/// "page=429".
fn has_status_token(message: &str, code: &str) -> bool {
    let is_glued = |c: Option<char>| {
        c.is_some_and(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '/' | '=' | '&' | '?' | '.' | '-' | '_')
        })
    };

    message.match_indices(code).any(|(start, _)| {
        let before = message[..start].chars().next_back();
        let after = message[start + code.len()..].chars().next();
        !is_glued(before) && !is_glued(after)
    })
}
