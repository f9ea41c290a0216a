//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks with `Arc<Mutex<_>>` recorders so tests can assert on
//! the calls an orchestrator made.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use url::Url;

use crate::error::AppError;
use crate::identity::{HeaderSet, IdentityPool, IdentitySource};
use crate::models::{ArticleRecord, RequestOptions};
use crate::report::{FetchEvent, FetchReporter};
use crate::traits::{Extractor, RedirectFollower, RedirectResponse, WebhookSender};
use crate::webhook::WebhookPayload;

pub fn article(title: &str) -> ArticleRecord {
    ArticleRecord {
        title: Some(title.to_string()),
        word_count: Some(120),
        ..Default::default()
    }
}

pub fn rate_limited() -> AppError {
    AppError::HttpStatus {
        status: 429,
        message: "Too Many Requests".into(),
    }
}

pub fn tls_error() -> AppError {
    AppError::HttpError("invalid peer certificate: UnknownIssuer".into())
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Each call pops the first queued response. Once the queue is empty every
/// call succeeds with a default article.
#[derive(Clone)]
pub struct MockExtractor {
    responses: Arc<Mutex<Vec<Result<ArticleRecord, AppError>>>>,
    calls: Arc<Mutex<Vec<(Url, RequestOptions)>>>,
    delay: Option<Duration>,
}

impl MockExtractor {
    pub fn new(article: ArticleRecord) -> Self {
        Self::with_responses(vec![Ok(article)])
    }

    /// Fails on every call with `error`'s message and status.
    pub fn with_error(error: AppError) -> Self {
        let repeated = (0..16).map(|_| Err(clone_error(&error))).collect();
        Self::with_responses(repeated)
    }

    pub fn with_responses(responses: Vec<Result<ArticleRecord, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Sleep for `delay` before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<(Url, RequestOptions)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Extractor for MockExtractor {
    async fn extract(
        &self,
        url: &Url,
        options: &RequestOptions,
    ) -> Result<ArticleRecord, AppError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.clone(), options.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(article("default"))
        } else {
            responses.remove(0)
        }
    }
}

fn clone_error(error: &AppError) -> AppError {
    match error {
        AppError::HttpStatus { status, message } => AppError::HttpStatus {
            status: *status,
            message: message.clone(),
        },
        AppError::Timeout(secs) => AppError::Timeout(*secs),
        AppError::NetworkError(msg) => AppError::NetworkError(msg.clone()),
        AppError::InvalidInput(msg) => AppError::InvalidInput(msg.clone()),
        other => AppError::Generic(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CountingIdentity
// ---------------------------------------------------------------------------

/// Real identity pool that counts how often it was asked for headers.
#[derive(Clone, Default)]
pub struct CountingIdentity {
    inner: IdentityPool,
    requested: Arc<Mutex<Vec<Url>>>,
}

impl CountingIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.requested.lock().unwrap().len()
    }
}

impl IdentitySource for CountingIdentity {
    fn next_headers(&self, url: &Url) -> HeaderSet {
        self.requested.lock().unwrap().push(url.clone());
        self.inner.next_headers(url)
    }
}

// ---------------------------------------------------------------------------
// MockRedirectFollower
// ---------------------------------------------------------------------------

/// Each call pops the first queued response; an empty queue answers 200 at
/// the requested URL.
#[derive(Clone)]
pub struct MockRedirectFollower {
    responses: Arc<Mutex<Vec<Result<RedirectResponse, AppError>>>>,
    calls: Arc<Mutex<Vec<(Url, RequestOptions)>>>,
}

impl MockRedirectFollower {
    pub fn with_responses(responses: Vec<Result<RedirectResponse, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<(Url, RequestOptions)> {
        self.calls.lock().unwrap().clone()
    }
}

impl RedirectFollower for MockRedirectFollower {
    async fn follow(
        &self,
        url: &Url,
        options: &RequestOptions,
    ) -> Result<RedirectResponse, AppError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.clone(), options.clone()));

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(RedirectResponse {
                final_url: url.clone(),
                status: 200,
            })
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockWebhookSender
// ---------------------------------------------------------------------------

/// Records every payload. Each send pops the first queued result; an empty
/// queue means success.
#[derive(Clone, Default)]
pub struct MockWebhookSender {
    results: Arc<Mutex<Vec<Result<(), AppError>>>>,
    sent: Arc<Mutex<Vec<(Url, WebhookPayload)>>>,
}

impl MockWebhookSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(results: Vec<Result<(), AppError>>) -> Self {
        Self {
            results: Arc::new(Mutex::new(results)),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sent(&self) -> Vec<(Url, WebhookPayload)> {
        self.sent.lock().unwrap().clone()
    }
}

impl WebhookSender for MockWebhookSender {
    async fn send(&self, target: &Url, payload: &WebhookPayload) -> Result<(), AppError> {
        self.sent
            .lock()
            .unwrap()
            .push((target.clone(), payload.clone()));

        let mut results = self.results.lock().unwrap();
        if results.is_empty() {
            Ok(())
        } else {
            results.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Records event names and every scheduled backoff delay.
#[derive(Clone, Default)]
pub struct MockReporter {
    labels: Arc<Mutex<Vec<String>>>,
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl FetchReporter for MockReporter {
    fn report(&self, event: FetchEvent<'_>) {
        let label = match &event {
            FetchEvent::AttemptStarted { .. } => "AttemptStarted",
            FetchEvent::AttemptFailed { .. } => "AttemptFailed",
            FetchEvent::TlsDowngraded { .. } => "TlsDowngraded",
            FetchEvent::BackoffScheduled { delay, .. } => {
                self.delays.lock().unwrap().push(*delay);
                "BackoffScheduled"
            }
            FetchEvent::Succeeded { .. } => "Succeeded",
            FetchEvent::GaveUp { .. } => "GaveUp",
            FetchEvent::Blocked { .. } => "Blocked",
            FetchEvent::BatchStarted { .. } => "BatchStarted",
            FetchEvent::ItemStarted { .. } => "ItemStarted",
            FetchEvent::ItemFinished { .. } => "ItemFinished",
            FetchEvent::Pacing { .. } => "Pacing",
            FetchEvent::BatchFinished { .. } => "BatchFinished",
        };
        self.labels.lock().unwrap().push(label.to_string());
    }
}
