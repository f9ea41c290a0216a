use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identity::{HeaderSet, IdentitySource};
use crate::models::{DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT, FetchRequest, RequestOutcome};
use crate::report::{FetchEvent, FetchReporter};
use crate::retry::RetryOrchestrator;
use crate::traits::Extractor;

/// Delay between consecutive batch items when none is configured.
pub const DEFAULT_INTER_REQUEST_DELAY: Duration = Duration::from_millis(2000);

/// Output keys that input pass-through fields may not overwrite.
const RESERVED_KEYS: &[&str] = &[
    "id",
    "url",
    "success",
    "data",
    "error",
    "attempts_made",
    "finished_at",
];

/// One input record of a batch.
///
/// `id` is an opaque correlation value echoed back on the output record.
/// Every other field is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BatchItem {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            id: None,
            extra: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Output record of a batch item: the item's id and pass-through fields
/// merged with its [`RequestOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub outcome: RequestOutcome,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BatchOutcome {
    fn from_item(item: BatchItem, mut outcome: RequestOutcome) -> Self {
        let BatchItem { url, id, mut extra } = item;
        extra.retain(|key, _| !RESERVED_KEYS.contains(&key.as_str()));
        // Report the URL as the caller wrote it, not the normalized form.
        outcome.url = url;
        Self { id, outcome, extra }
    }

    pub fn success(&self) -> bool {
        self.outcome.success
    }
}

/// Ordered list of URLs processed sequentially with pacing.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub items: Vec<BatchItem>,
    pub inter_request_delay: Duration,
    pub max_retries_per_item: u32,
    pub timeout: Duration,
    pub allow_insecure_tls: bool,
    pub headers: HeaderSet,
}

impl BatchJob {
    pub fn new(items: Vec<BatchItem>) -> Self {
        Self {
            items,
            inter_request_delay: DEFAULT_INTER_REQUEST_DELAY,
            max_retries_per_item: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            allow_insecure_tls: false,
            headers: HeaderSet::new(),
        }
    }

    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(urls.into_iter().map(BatchItem::new).collect())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.inter_request_delay = delay;
        self
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries_per_item = max;
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

    pub fn with_headers(mut self, headers: HeaderSet) -> Self {
        self.headers = headers;
        self
    }

    fn request_for(&self, item: &BatchItem) -> Result<FetchRequest, crate::error::AppError> {
        Ok(FetchRequest::new(&item.url)?
            .with_max_retries(self.max_retries_per_item)
            .with_timeout(self.timeout)
            .with_insecure_tls(self.allow_insecure_tls)
            .with_headers(self.headers.clone()))
    }
}

/// Aggregate counts over a batch. Rates are percentages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub failure_rate: f64,
}

impl BatchStats {
    fn record(&mut self, success: bool) {
        self.total += 1;
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.success_rate = percent(self.succeeded, self.total);
        self.failure_rate = percent(self.failed, self.total);
    }

    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a BatchOutcome>) -> Self {
        let mut stats = Self::default();
        for outcome in outcomes {
            stats.record(outcome.success());
        }
        stats
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
    pub stats: BatchStats,
}

impl BatchReport {
    /// The unsuccessful outcomes, in input order.
    pub fn failed(&self) -> Vec<&BatchOutcome> {
        self.outcomes.iter().filter(|o| !o.success()).collect()
    }

    pub fn has_failures(&self) -> bool {
        self.stats.failed > 0
    }
}

/// Runs a [`BatchJob`] through a [`RetryOrchestrator`], one item at a time.
#[derive(Clone)]
pub struct BatchOrchestrator<E, I>
where
    E: Extractor,
    I: IdentitySource,
{
    retry: RetryOrchestrator<E, I>,
}

impl<E, I> BatchOrchestrator<E, I>
where
    E: Extractor,
    I: IdentitySource,
{
    pub fn new(retry: RetryOrchestrator<E, I>) -> Self {
        Self { retry }
    }

    /// Process every item in input order. Never aborts early: a failed or
    /// invalid item becomes a failed outcome and the batch moves on.
    pub async fn run<R: FetchReporter>(&self, job: BatchJob, reporter: &R) -> BatchReport {
        let total = job.items.len();
        reporter.report(FetchEvent::BatchStarted { total });

        let mut stats = BatchStats::default();
        let mut outcomes = Vec::with_capacity(total);

        for (index, item) in job.items.iter().enumerate() {
            reporter.report(FetchEvent::ItemStarted {
                index,
                total,
                url: &item.url,
            });

            let outcome = match job.request_for(item) {
                Ok(request) => self.retry.execute(request, reporter).await,
                Err(e) => RequestOutcome::failed(item.url.clone(), e.to_string(), 0),
            };

            stats.record(outcome.success);
            reporter.report(FetchEvent::ItemFinished {
                index,
                total,
                outcome: &outcome,
            });
            outcomes.push(BatchOutcome::from_item(item.clone(), outcome));

            if index + 1 < total && !job.inter_request_delay.is_zero() {
                reporter.report(FetchEvent::Pacing {
                    delay: job.inter_request_delay,
                });
                tokio::time::sleep(job.inter_request_delay).await;
            }
        }

        reporter.report(FetchEvent::BatchFinished { stats: &stats });
        BatchReport { outcomes, stats }
    }
}
