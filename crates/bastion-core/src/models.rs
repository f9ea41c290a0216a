use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::classify::ClassifiedError;
use crate::error::AppError;
use crate::identity::HeaderSet;
use crate::util::parse_http_url;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A single URL to run through the retry policy.
///
/// Everything except the TLS mode is fixed once the attempt sequence starts.
/// The TLS mode can only move from strict to insecure, never back.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    url: Url,
    override_headers: HeaderSet,
    max_retries: u32,
    allow_insecure_tls: bool,
    timeout: Duration,
}

impl FetchRequest {
    /// Build a request for `url`, rejecting anything that is not an
    /// absolute http(s) URL.
    pub fn new(url: &str) -> Result<Self, AppError> {
        Ok(Self::from_url(parse_http_url(url)?))
    }

    pub fn from_url(url: Url) -> Self {
        Self {
            url,
            override_headers: HeaderSet::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            allow_insecure_tls: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_insecure_tls(mut self, allow: bool) -> Self {
        self.allow_insecure_tls = allow;
        self
    }

    /// Add a header that overrides the generated identity header of the
    /// same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.override_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.override_headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn override_headers(&self) -> &HeaderSet {
        &self.override_headers
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn allow_insecure_tls(&self) -> bool {
        self.allow_insecure_tls
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Switch certificate verification off for the remaining attempts.
    ///
    /// Returns true if the mode actually changed.
    pub(crate) fn downgrade_tls(&mut self) -> bool {
        let changed = !self.allow_insecure_tls;
        self.allow_insecure_tls = true;
        changed
    }
}

/// Per-attempt options handed to an outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub headers: HeaderSet,
    pub timeout: Duration,
    pub allow_insecure_tls: bool,
}

/// Structured article as returned by the extraction service.
///
/// Only the commonly used fields are typed; anything else the service sends
/// is kept in `extra` and written back out unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Result of one attempt inside a retry sequence.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Success(ArticleRecord),
    Failure(ClassifiedError),
}

#[derive(Debug, Clone)]
pub struct AttemptResult {
    /// 1-indexed.
    pub attempt_number: u32,
    /// TLS mode the attempt was made with.
    pub insecure_tls: bool,
    pub outcome: AttemptOutcome,
}

impl AttemptResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success(_))
    }
}

/// Terminal result of a [`FetchRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestOutcome {
    pub url: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ArticleRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts_made: u32,
    pub finished_at: DateTime<Utc>,
}

impl RequestOutcome {
    pub fn succeeded(url: impl Into<String>, data: ArticleRecord, attempts_made: u32) -> Self {
        Self {
            url: url.into(),
            success: true,
            data: Some(data),
            error: None,
            attempts_made,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(url: impl Into<String>, error: impl Into<String>, attempts_made: u32) -> Self {
        Self {
            url: url.into(),
            success: false,
            data: None,
            error: Some(error.into()),
            attempts_made,
            finished_at: Utc::now(),
        }
    }

    /// Attempts beyond the first.
    pub fn retries(&self) -> u32 {
        self.attempts_made.saturating_sub(1)
    }
}
