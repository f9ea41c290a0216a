use std::time::Duration;

use url::Url;

use crate::batch::BatchStats;
use crate::classify::ClassifiedError;
use crate::models::RequestOutcome;

/// Events emitted by the retry and batch orchestrators for monitoring/logging.
#[derive(Debug, Clone)]
pub enum FetchEvent<'a> {
    AttemptStarted {
        url: &'a Url,
        attempt: u32,
        max_retries: u32,
        insecure_tls: bool,
    },
    AttemptFailed {
        url: &'a Url,
        attempt: u32,
        error: &'a ClassifiedError,
    },
    TlsDowngraded {
        url: &'a Url,
        attempt: u32,
    },
    BackoffScheduled {
        url: &'a Url,
        attempt: u32,
        delay: Duration,
    },
    Succeeded {
        url: &'a Url,
        attempts: u32,
    },
    GaveUp {
        url: &'a Url,
        attempts: u32,
        error: &'a str,
    },
    Blocked {
        url: &'a Url,
        domain: &'a str,
    },
    BatchStarted {
        total: usize,
    },
    ItemStarted {
        index: usize,
        total: usize,
        url: &'a str,
    },
    ItemFinished {
        index: usize,
        total: usize,
        outcome: &'a RequestOutcome,
    },
    Pacing {
        delay: Duration,
    },
    BatchFinished {
        stats: &'a BatchStats,
    },
}

/// Trait for receiving orchestrator events (decoupled logging).
pub trait FetchReporter: Send + Sync {
    fn report(&self, event: FetchEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl FetchReporter for NullReporter {}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl FetchReporter for TracingReporter {
    fn report(&self, event: FetchEvent<'_>) {
        match event {
            FetchEvent::AttemptStarted {
                url,
                attempt,
                max_retries,
                insecure_tls,
            } => {
                tracing::info!(%url, %attempt, %max_retries, %insecure_tls, "Attempting extraction");
            }
            FetchEvent::AttemptFailed {
                url,
                attempt,
                error,
            } => {
                tracing::warn!(
                    %url,
                    %attempt,
                    kind = %error.kind,
                    status = ?error.source_status,
                    error = %error.message,
                    "Attempt failed"
                );
            }
            FetchEvent::TlsDowngraded { url, attempt } => {
                tracing::warn!(%url, %attempt, "Certificate verification disabled for remaining attempts");
            }
            FetchEvent::BackoffScheduled {
                url,
                attempt,
                delay,
            } => {
                tracing::info!(%url, %attempt, delay_ms = %delay.as_millis(), "Backing off");
            }
            FetchEvent::Succeeded { url, attempts } => {
                tracing::info!(%url, %attempts, "Extraction succeeded");
            }
            FetchEvent::GaveUp {
                url,
                attempts,
                error,
            } => {
                tracing::error!(%url, %attempts, %error, "Giving up");
            }
            FetchEvent::Blocked { url, domain } => {
                tracing::warn!(%url, %domain, "Domain is blocklisted, skipping");
            }
            FetchEvent::BatchStarted { total } => {
                tracing::info!(%total, "Batch started");
            }
            FetchEvent::ItemStarted { index, total, url } => {
                tracing::info!("[{}/{}] Parsing {}", index + 1, total, url);
            }
            FetchEvent::ItemFinished {
                index,
                total,
                outcome,
            } => {
                if outcome.success {
                    let title = outcome
                        .data
                        .as_ref()
                        .and_then(|d| d.title.as_deref())
                        .unwrap_or("(no title)");
                    tracing::info!(attempts = %outcome.attempts_made, "[{}/{}] OK: {}", index + 1, total, title);
                } else {
                    tracing::warn!(
                        attempts = %outcome.attempts_made,
                        error = outcome.error.as_deref().unwrap_or_default(),
                        "[{}/{}] FAILED",
                        index + 1,
                        total
                    );
                }
            }
            FetchEvent::Pacing { delay } => {
                tracing::debug!(delay_ms = %delay.as_millis(), "Pacing before next item");
            }
            FetchEvent::BatchFinished { stats } => {
                tracing::info!(
                    total = %stats.total,
                    succeeded = %stats.succeeded,
                    failed = %stats.failed,
                    "Batch finished ({:.1}% succeeded)",
                    stats.success_rate
                );
            }
        }
    }
}
