//! Canonical URL resolution by following HTTP redirects.

use std::time::Duration;

use url::Url;

use crate::backoff::{BackoffDecision, BackoffPolicy};
use crate::classify::classify;
use crate::error::AppError;
use crate::identity::{HeaderSet, IdentityPool, IdentitySource};
use crate::models::{DEFAULT_TIMEOUT, RequestOptions};
use crate::traits::RedirectFollower;
use crate::util::parse_http_url;

/// Hop limit for a single resolution.
pub const MAX_REDIRECTS: usize = 5;

/// User-Agent sent when the enhanced identity is not requested.
pub const PLAIN_USER_AGENT: &str = concat!("bastion/", env!("CARGO_PKG_VERSION"));

/// Query parameters that may carry the wrapped target, in lookup order.
const GOOGLE_TARGET_PARAMS: [&str; 3] = ["url", "q", "u"];

/// Unwrap a Google redirect link (`https://www.google.com/url?url=...`).
///
/// Returns the input unchanged when the host is not a Google host or no
/// parameter holds an absolute http(s) URL.
pub fn decode_google_redirect(url: &Url) -> Url {
    let is_google = url
        .host_str()
        .is_some_and(|host| host.contains("google.com"));
    if !is_google {
        return url.clone();
    }

    for param in GOOGLE_TARGET_PARAMS {
        let Some(value) = url
            .query_pairs()
            .find(|(key, _)| key == param)
            .map(|(_, value)| value.into_owned())
        else {
            continue;
        };
        if !(value.starts_with("http://") || value.starts_with("https://")) {
            continue;
        }
        if let Ok(decoded) = parse_http_url(&value) {
            return decoded;
        }
    }

    url.clone()
}

/// Result of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    pub original_url: Url,
    pub final_url: Url,
    pub status_code: u16,
}

impl ResolvedUrl {
    pub fn changed(&self) -> bool {
        self.original_url != self.final_url
    }
}

/// Follows redirects for a URL without invoking extraction.
///
/// A single attempt by default. [`with_max_attempts`](Self::with_max_attempts)
/// enables the same classification and backoff used for extraction,
/// including the TLS downgrade.
#[derive(Clone)]
pub struct RedirectResolver<P, I = IdentityPool>
where
    P: RedirectFollower,
    I: IdentitySource,
{
    follower: P,
    identity: I,
    policy: BackoffPolicy,
    max_attempts: u32,
    timeout: Duration,
}

impl<P: RedirectFollower> RedirectResolver<P, IdentityPool> {
    pub fn new(follower: P) -> Self {
        Self::with_identity(follower, IdentityPool::default())
    }
}

impl<P, I> RedirectResolver<P, I>
where
    P: RedirectFollower,
    I: IdentitySource,
{
    pub fn with_identity(follower: P, identity: I) -> Self {
        Self {
            follower,
            identity,
            policy: BackoffPolicy::default(),
            max_attempts: 1,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn resolve(
        &self,
        url: &Url,
        use_enhanced_identity: bool,
        allow_insecure_tls: bool,
    ) -> Result<ResolvedUrl, AppError> {
        let target = decode_google_redirect(url);
        if target != *url {
            tracing::debug!(original = %url, decoded = %target, "Unwrapped Google redirect");
        }

        let mut insecure_tls = allow_insecure_tls;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let options = RequestOptions {
                headers: self.headers_for(&target, use_enhanced_identity),
                timeout: self.timeout,
                allow_insecure_tls: insecure_tls,
            };

            let err = match self.follower.follow(&target, &options).await {
                Ok(response) if response.status >= 400 => AppError::HttpStatus {
                    status: response.status,
                    message: format!("Redirect chain ended at {}", response.final_url),
                },
                Ok(response) => {
                    tracing::info!(
                        original = %url,
                        resolved = %response.final_url,
                        status = response.status,
                        "URL resolved"
                    );
                    return Ok(ResolvedUrl {
                        original_url: url.clone(),
                        final_url: response.final_url,
                        status_code: response.status,
                    });
                }
                Err(e) => e,
            };

            if err.is_input_error() {
                return Err(err);
            }

            let classified = classify(&err);
            tracing::warn!(%url, %attempt, kind = %classified.kind, error = %err, "Resolve attempt failed");

            let delay = match self.policy.decide(classified.kind, attempt, self.max_attempts) {
                BackoffDecision::Stop => return Err(err),
                BackoffDecision::RetryAfter(delay) => delay,
                BackoffDecision::RetryWithTlsDowngrade(delay) => {
                    insecure_tls = true;
                    delay
                }
            };
            tokio::time::sleep(delay).await;
        }
    }

    fn headers_for(&self, url: &Url, use_enhanced_identity: bool) -> HeaderSet {
        if use_enhanced_identity {
            return self.identity.next_headers(url);
        }
        let mut headers = HeaderSet::new();
        headers.insert("User-Agent".into(), PLAIN_USER_AGENT.into());
        headers
    }
}
