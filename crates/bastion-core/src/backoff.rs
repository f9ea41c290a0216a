use std::time::Duration;

use crate::classify::ErrorKind;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
    /// Give up and report the last error.
    Stop,
    /// Wait, then try again with the same TLS mode.
    RetryAfter(Duration),
    /// Disable certificate verification for the rest of this request,
    /// wait, then try again.
    RetryWithTlsDowngrade(Duration),
}

impl BackoffDecision {
    pub fn delay(&self) -> Option<Duration> {
        match self {
            BackoffDecision::Stop => None,
            BackoffDecision::RetryAfter(d) | BackoffDecision::RetryWithTlsDowngrade(d) => Some(*d),
        }
    }
}

/// Backoff table.
///
/// - 429 / 403: `2^attempt` seconds, capped at `max_delay`
/// - TLS failure: downgrade, then `tls_delay`
/// - anything else: `retry_delay`
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub retry_delay: Duration,
    pub tls_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(1),
            tls_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Decide the next step after attempt `attempt` (1-indexed) failed with
    /// `kind`. Always `Stop` once the attempt budget is spent.
    pub fn decide(&self, kind: ErrorKind, attempt: u32, max_retries: u32) -> BackoffDecision {
        if attempt >= max_retries {
            return BackoffDecision::Stop;
        }

        match kind {
            ErrorKind::RateLimited | ErrorKind::Forbidden => {
                BackoffDecision::RetryAfter(self.exponential_delay(attempt))
            }
            ErrorKind::TlsError => BackoffDecision::RetryWithTlsDowngrade(self.tls_delay),
            ErrorKind::Timeout | ErrorKind::NetworkError | ErrorKind::Unknown => {
                BackoffDecision::RetryAfter(self.retry_delay)
            }
        }
    }

    /// `2^attempt` seconds, never above `max_delay`.
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let secs = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        std::cmp::min(Duration::from_secs(secs), self.max_delay)
    }
}
