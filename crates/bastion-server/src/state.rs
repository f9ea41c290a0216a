use bastion_client::{ReqwestRedirectFollower, ReqwestWebhookSender, ServiceExtractor};
use bastion_core::error::AppError;
use bastion_core::identity::IdentityPool;
use bastion_core::redirect::RedirectResolver;
use bastion_core::report::TracingReporter;
use bastion_core::retry::RetryOrchestrator;
use bastion_core::webhook::{WebhookDelivery, WebhookDispatcher};

use crate::config::ServerConfig;

pub type Dispatcher =
    WebhookDispatcher<ServiceExtractor, IdentityPool, ReqwestWebhookSender, TracingReporter>;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub config: ServerConfig,
    pub retry: RetryOrchestrator<ServiceExtractor>,
    pub resolver: RedirectResolver<ReqwestRedirectFollower>,
    /// Detached fetch-then-callback jobs, drained on shutdown.
    pub webhooks: Dispatcher,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self, AppError> {
        let extractor = ServiceExtractor::new(config.fetch.extractor_url.clone())?;
        let retry = RetryOrchestrator::new(extractor)
            .with_policy(config.fetch.backoff_policy())
            .with_blocklist(config.fetch.blocked_domains.clone());
        if !retry.blocklist().is_empty() {
            tracing::info!(domains = ?retry.blocklist().domains(), "Domain blocklist active");
        }

        let mut follower = ReqwestRedirectFollower::with_timeout(config.fetch.timeout)?;
        let mut sender = ReqwestWebhookSender::new()?;
        if config.allow_private_urls {
            tracing::warn!("Outbound requests to private addresses are allowed");
            follower = follower.allow_private_urls();
            sender = sender.allow_private_urls();
        }

        let resolver = RedirectResolver::new(follower)
            .with_max_attempts(config.resolve_max_attempts)
            .with_timeout(config.fetch.timeout)
            .with_policy(config.fetch.backoff_policy());

        let webhooks = WebhookDispatcher::new(
            retry.clone(),
            WebhookDelivery::new(sender),
            TracingReporter,
        );

        Ok(Self {
            config,
            retry,
            resolver,
            webhooks,
        })
    }
}
