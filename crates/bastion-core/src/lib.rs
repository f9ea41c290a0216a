pub mod backoff;
pub mod batch;
pub mod blocklist;
pub mod classify;
pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod redirect;
pub mod report;
pub mod retry;
pub mod traits;
pub mod util;
pub mod webhook;

#[cfg(test)]
pub mod testutil;

pub use backoff::{BackoffDecision, BackoffPolicy};
pub use batch::{BatchItem, BatchJob, BatchOrchestrator, BatchOutcome, BatchReport, BatchStats};
pub use blocklist::DomainBlocklist;
pub use classify::{ClassifiedError, ErrorKind, classify};
pub use config::FetchConfig;
pub use error::AppError;
pub use identity::{HeaderSet, IdentityPool, IdentitySource};
pub use models::{ArticleRecord, FetchRequest, RequestOptions, RequestOutcome};
pub use redirect::{RedirectResolver, ResolvedUrl, decode_google_redirect};
pub use report::{FetchEvent, FetchReporter, NullReporter, TracingReporter};
pub use retry::{RetryOrchestrator, RetryTrace};
pub use traits::{Extractor, RedirectFollower, RedirectResponse, WebhookSender};
pub use webhook::{DeliveryReport, WebhookDelivery, WebhookDispatcher, WebhookPayload};
