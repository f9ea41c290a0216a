use std::time::Duration;

use bastion_core::error::AppError;
use bastion_core::identity::HeaderSet;
use bastion_core::models::{ArticleRecord, RequestOptions};
use bastion_core::traits::Extractor;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::http::{map_send_error, strict_client};

/// Client for an HTTP Content Extraction Service.
///
/// Posts `{url, headers, timeout_secs, skip_ssl}` to the configured endpoint
/// and expects `{success, data | error, status_code?}` back. A failure the
/// service attributes to the target site (`status_code`) is surfaced as
/// [`AppError::HttpStatus`] so the classifier sees the upstream status.
#[derive(Clone)]
pub struct ServiceExtractor {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl ServiceExtractor {
    pub fn new(endpoint: Url) -> Result<Self, AppError> {
        Self::with_timeout(endpoint, Duration::from_secs(120))
    }

    /// `timeout` bounds the whole service call, independent of the
    /// per-attempt timeout passed along in each request.
    pub fn with_timeout(endpoint: Url, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: strict_client(timeout, Some(10))?,
            endpoint,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

// ---- Extraction service wire types ----

#[derive(Serialize)]
struct ExtractRequest<'a> {
    url: &'a str,
    headers: &'a HeaderSet,
    timeout_secs: u64,
    skip_ssl: bool,
}

#[derive(Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ArticleRecord>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    status_code: Option<u16>,
}

impl ExtractResponse {
    fn into_error(self, fallback_status: Option<u16>) -> AppError {
        let message = self
            .error
            .unwrap_or_else(|| "Extraction failed without an error message".to_string());
        match self.status_code.or(fallback_status) {
            Some(status) => AppError::HttpStatus { status, message },
            None => AppError::ExtractionError(message),
        }
    }
}

impl Extractor for ServiceExtractor {
    async fn extract(&self, url: &Url, options: &RequestOptions) -> Result<ArticleRecord, AppError> {
        let body = ExtractRequest {
            url: url.as_str(),
            headers: &options.headers,
            timeout_secs: options.timeout.as_secs(),
            skip_ssl: options.allow_insecure_tls,
        };

        tracing::debug!(%url, endpoint = %self.endpoint, "Calling extraction service");

        // The service call itself is always verified; skip_ssl only applies
        // to the service's fetch of the target.
        let response = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.timeout.min(options.timeout))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(e, options.timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read extraction response: {e}")))?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<ExtractResponse>(&text) {
                Ok(parsed) if parsed.error.is_some() => parsed.into_error(Some(status.as_u16())),
                _ => AppError::HttpStatus {
                    status: status.as_u16(),
                    message: text.chars().take(200).collect(),
                },
            });
        }

        let parsed: ExtractResponse = serde_json::from_str(&text).map_err(|e| {
            AppError::ExtractionError(format!("Failed to parse extraction response: {e}"))
        })?;

        if !parsed.success {
            return Err(parsed.into_error(None));
        }

        parsed
            .data
            .ok_or_else(|| AppError::ExtractionError("Extraction service returned no data".into()))
    }
}
