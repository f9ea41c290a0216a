use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::backoff::BackoffPolicy;
use crate::batch::DEFAULT_INTER_REQUEST_DELAY;
use crate::blocklist::DomainBlocklist;
use crate::error::AppError;
use crate::models::{DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT};
use crate::util::parse_http_url;

/// Orchestration settings shared by the server and the CLI.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub extractor_url: Url,
    pub inter_request_delay: Duration,
    pub max_retries: u32,
    pub timeout: Duration,
    pub max_backoff: Duration,
    pub blocked_domains: DomainBlocklist,
}

impl FetchConfig {
    /// Load configuration from environment variables:
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `BASTION_EXTRACTOR_URL` | required |
    /// | `BASTION_DELAY_MS` | 2000 |
    /// | `BASTION_MAX_RETRIES` | 3 |
    /// | `BASTION_TIMEOUT_SECS` | 30 |
    /// | `BASTION_MAX_BACKOFF_SECS` | 60 |
    /// | `BASTION_BLOCKED_DOMAINS` | empty (comma-separated) |
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup("BASTION_EXTRACTOR_URL").ok_or_else(|| {
            AppError::ConfigError(
                "BASTION_EXTRACTOR_URL not set. Required to reach the extraction service.".into(),
            )
        })?;
        let extractor_url = parse_http_url(&raw_url).map_err(|e| {
            AppError::ConfigError(format!("Invalid BASTION_EXTRACTOR_URL: {e}"))
        })?;

        let delay_ms: u64 = parse_var(
            &lookup,
            "BASTION_DELAY_MS",
            DEFAULT_INTER_REQUEST_DELAY.as_millis() as u64,
        )?;
        let max_retries: u32 = parse_var(&lookup, "BASTION_MAX_RETRIES", DEFAULT_MAX_RETRIES)?;
        let timeout_secs: u64 =
            parse_var(&lookup, "BASTION_TIMEOUT_SECS", DEFAULT_TIMEOUT.as_secs())?;
        let max_backoff_secs: u64 = parse_var(&lookup, "BASTION_MAX_BACKOFF_SECS", 60)?;

        let blocked_domains = lookup("BASTION_BLOCKED_DOMAINS")
            .map(|raw| DomainBlocklist::parse(&raw))
            .unwrap_or_default();

        if timeout_secs == 0 {
            return Err(AppError::ConfigError(
                "BASTION_TIMEOUT_SECS must be at least 1".into(),
            ));
        }
        if max_backoff_secs == 0 {
            return Err(AppError::ConfigError(
                "BASTION_MAX_BACKOFF_SECS must be at least 1".into(),
            ));
        }

        Ok(Self {
            extractor_url,
            inter_request_delay: Duration::from_millis(delay_ms),
            max_retries,
            timeout: Duration::from_secs(timeout_secs),
            max_backoff: Duration::from_secs(max_backoff_secs),
            blocked_domains,
        })
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::default().with_max_delay(self.max_backoff)
    }
}

/// Parse an optional variable, falling back to `default` when unset.
pub fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            AppError::ConfigError(format!(
                "Invalid {key} '{raw}': must be a non-negative integer"
            ))
        }),
    }
}
