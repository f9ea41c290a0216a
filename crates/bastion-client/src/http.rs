use std::time::Duration;

use bastion_core::error::AppError;
use bastion_core::identity::HeaderSet;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, redirect};

/// A pair of clients differing only in certificate verification.
///
/// reqwest fixes TLS settings at build time, so the insecure variant is
/// built up front and picked per request. Neither follows redirects; callers
/// walk the chain themselves.
#[derive(Clone)]
pub(crate) struct ClientPair {
    strict: Client,
    insecure: Client,
}

impl ClientPair {
    pub(crate) fn build(timeout: Duration) -> Result<Self, AppError> {
        let strict = strict_client(timeout, None)?;
        let insecure = builder(timeout, None)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;
        Ok(Self { strict, insecure })
    }

    pub(crate) fn get(&self, allow_insecure_tls: bool) -> &Client {
        if allow_insecure_tls {
            &self.insecure
        } else {
            &self.strict
        }
    }
}

/// A verifying client. `max_redirects` of `None` disables redirect following.
pub(crate) fn strict_client(
    timeout: Duration,
    max_redirects: Option<usize>,
) -> Result<Client, AppError> {
    builder(timeout, max_redirects)
        .build()
        .map_err(|e| AppError::HttpError(e.to_string()))
}

fn builder(timeout: Duration, max_redirects: Option<usize>) -> reqwest::ClientBuilder {
    let policy = match max_redirects {
        Some(max) => redirect::Policy::limited(max),
        None => redirect::Policy::none(),
    };
    Client::builder().timeout(timeout).redirect(policy)
}

/// Map a transport-level reqwest error onto [`AppError`].
pub(crate) fn map_send_error(e: reqwest::Error, timeout: Duration) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(timeout.as_secs())
    } else if e.is_redirect() {
        AppError::HttpError(format!("Too many redirects: {e}"))
    } else if e.is_connect() {
        // Keep the source chain: certificate failures surface here too and
        // are told apart by their message.
        AppError::NetworkError(format!("Connection failed: {}", error_chain(&e)))
    } else {
        AppError::HttpError(error_chain(&e))
    }
}

/// `e` followed by all of its sources, joined with ": ".
fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/// Convert a header set into a reqwest header map, skipping entries that are
/// not valid HTTP headers.
pub(crate) fn header_map(headers: &HeaderSet) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => tracing::debug!(header = %name, "Skipping invalid header"),
        }
    }
    map
}
