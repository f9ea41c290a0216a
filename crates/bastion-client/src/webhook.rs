use std::time::Duration;

use bastion_core::error::AppError;
use bastion_core::traits::WebhookSender;
use bastion_core::webhook::WebhookPayload;
use reqwest::Client;
use url::Url;

use crate::guard::ensure_public;
use crate::http::{map_send_error, strict_client};

const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts webhook payloads as JSON. Any non-2xx answer is an error.
#[derive(Clone)]
pub struct ReqwestWebhookSender {
    client: Client,
    timeout: Duration,
    ssrf_protection: bool,
}

impl ReqwestWebhookSender {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(DEFAULT_WEBHOOK_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: strict_client(timeout, None)?,
            timeout,
            ssrf_protection: true,
        })
    }

    pub fn allow_private_urls(mut self) -> Self {
        self.ssrf_protection = false;
        self
    }
}

impl WebhookSender for ReqwestWebhookSender {
    async fn send(&self, target: &Url, payload: &WebhookPayload) -> Result<(), AppError> {
        if self.ssrf_protection {
            ensure_public(target).await?;
        }

        let response = self
            .client
            .post(target.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::WebhookError(format!(
                "HTTP {} from {}",
                status.as_u16(),
                target
            )));
        }

        Ok(())
    }
}
