//! Fire-and-forget delivery of a single result to a caller's callback URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::task::TaskTracker;
use url::Url;
use uuid::Uuid;

use crate::identity::IdentitySource;
use crate::models::{ArticleRecord, FetchRequest, RequestOutcome};
use crate::report::FetchReporter;
use crate::retry::RetryOrchestrator;
use crate::traits::{Extractor, WebhookSender};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessPayload {
    pub success: bool,
    pub original_url: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub parsed_data: ArticleRecord,
    pub attempts: u32,
    pub retries: u32,
    pub parsed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailurePayload {
    pub success: bool,
    pub original_url: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// Body posted to the callback URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WebhookPayload {
    Success(SuccessPayload),
    Failure(FailurePayload),
}

impl WebhookPayload {
    /// Shape the payload according to the outcome.
    pub fn from_outcome(
        original_url: &str,
        outcome: &RequestOutcome,
        metadata: &Map<String, Value>,
    ) -> Self {
        match (&outcome.data, outcome.success) {
            (Some(data), true) => WebhookPayload::Success(SuccessPayload {
                success: true,
                original_url: original_url.to_string(),
                metadata: metadata.clone(),
                parsed_data: data.clone(),
                attempts: outcome.attempts_made,
                retries: outcome.retries(),
                parsed_at: outcome.finished_at,
            }),
            _ => Self::failure(
                original_url,
                metadata,
                outcome.error.as_deref().unwrap_or("Unknown error"),
            ),
        }
    }

    pub fn failure(original_url: &str, metadata: &Map<String, Value>, error: &str) -> Self {
        WebhookPayload::Failure(FailurePayload {
            success: false,
            original_url: original_url.to_string(),
            metadata: metadata.clone(),
            error: error.to_string(),
            failed_at: Utc::now(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WebhookPayload::Success(_))
    }

    pub fn original_url(&self) -> &str {
        match self {
            WebhookPayload::Success(p) => &p.original_url,
            WebhookPayload::Failure(p) => &p.original_url,
        }
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        match self {
            WebhookPayload::Success(p) => &p.metadata,
            WebhookPayload::Failure(p) => &p.metadata,
        }
    }
}

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempted: bool,
    pub delivered: bool,
    pub fallback_attempted: bool,
}

/// Posts a payload once and, if that fails, posts a failure-shaped payload
/// one more time. Never returns an error.
#[derive(Clone)]
pub struct WebhookDelivery<W: WebhookSender> {
    sender: W,
}

impl<W: WebhookSender> WebhookDelivery<W> {
    pub fn new(sender: W) -> Self {
        Self { sender }
    }

    pub async fn deliver(&self, target: &Url, payload: &WebhookPayload) -> DeliveryReport {
        let mut report = DeliveryReport {
            attempted: true,
            ..Default::default()
        };

        let err = match self.sender.send(target, payload).await {
            Ok(()) => {
                tracing::info!(%target, success = payload.is_success(), "Webhook delivered");
                report.delivered = true;
                return report;
            }
            Err(e) => e,
        };

        tracing::warn!(%target, error = %err, "Webhook delivery failed, sending failure notice");
        report.fallback_attempted = true;

        let fallback = WebhookPayload::failure(
            payload.original_url(),
            payload.metadata(),
            &err.to_string(),
        );
        if let Err(e) = self.sender.send(target, &fallback).await {
            tracing::error!(%target, error = %e, "Failure notice could not be delivered");
        }

        report
    }
}

/// Runs fetch-then-notify jobs on detached tasks.
///
/// Every job is registered with a [`TaskTracker`] so in-flight deliveries can
/// be drained with [`shutdown`](Self::shutdown).
#[derive(Clone)]
pub struct WebhookDispatcher<E, I, W, R>
where
    E: Extractor,
    I: IdentitySource,
    W: WebhookSender,
    R: FetchReporter,
{
    retry: RetryOrchestrator<E, I>,
    delivery: WebhookDelivery<W>,
    reporter: R,
    tracker: TaskTracker,
}

impl<E, I, W, R> WebhookDispatcher<E, I, W, R>
where
    E: Extractor + 'static,
    I: IdentitySource + 'static,
    W: WebhookSender + 'static,
    R: FetchReporter + Clone + 'static,
{
    pub fn new(retry: RetryOrchestrator<E, I>, delivery: WebhookDelivery<W>, reporter: R) -> Self {
        Self {
            retry,
            delivery,
            reporter,
            tracker: TaskTracker::new(),
        }
    }

    /// Spawn the job and return its delivery id immediately.
    pub fn dispatch(
        &self,
        request: FetchRequest,
        target: Url,
        metadata: Map<String, Value>,
    ) -> Uuid {
        let delivery_id = Uuid::new_v4();
        let retry = self.retry.clone();
        let delivery = self.delivery.clone();
        let reporter = self.reporter.clone();

        self.tracker.spawn(async move {
            let original_url = request.url().to_string();
            let outcome = retry.execute(request, &reporter).await;
            let payload = WebhookPayload::from_outcome(&original_url, &outcome, &metadata);
            let report = delivery.deliver(&target, &payload).await;
            tracing::debug!(
                %delivery_id,
                delivered = report.delivered,
                fallback = report.fallback_attempted,
                "Webhook job finished"
            );
        });

        tracing::info!(%delivery_id, "Webhook job accepted");
        delivery_id
    }

    /// Jobs that have been spawned and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting new jobs and wait for the running ones.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}
