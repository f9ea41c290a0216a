use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bastion_core::batch::{BatchItem, BatchOutcome, BatchStats};
use bastion_core::models::{ArticleRecord, RequestOutcome};

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ParseRequest {
    /// Target URL (http/https)
    pub url: String,
    /// Total attempt budget (default: BASTION_MAX_RETRIES)
    pub max_retries: Option<u32>,
    /// Start with certificate verification disabled
    pub skip_ssl: Option<bool>,
    /// Headers that replace the generated identity headers
    pub headers: Option<BTreeMap<String, String>>,
    /// Per-attempt timeout (default: BASTION_TIMEOUT_SECS)
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ParseQuery {
    pub url: String,
    pub max_retries: Option<u32>,
    pub skip_ssl: Option<bool>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ParseResponse {
    pub url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<ArticleRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
    pub retries: u32,
    pub finished_at: DateTime<Utc>,
}

impl From<RequestOutcome> for ParseResponse {
    fn from(outcome: RequestOutcome) -> Self {
        let retries = outcome.retries();
        Self {
            url: outcome.url,
            success: outcome.success,
            data: outcome.data,
            error: outcome.error,
            attempts: outcome.attempts_made,
            retries,
            finished_at: outcome.finished_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct BatchRequest {
    /// Plain URL list
    pub urls: Option<Vec<String>>,
    /// Records with `url`, optional `id` and any pass-through fields
    #[schema(value_type = Option<Vec<Object>>)]
    pub items: Option<Vec<BatchItem>>,
    /// Pause between items (default: BASTION_DELAY_MS)
    pub delay_ms: Option<u64>,
    /// Attempt budget per item
    pub max_retries: Option<u32>,
    pub skip_ssl: Option<bool>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BatchStatsResponse {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub failure_rate: f64,
}

impl From<BatchStats> for BatchStatsResponse {
    fn from(stats: BatchStats) -> Self {
        Self {
            total: stats.total,
            succeeded: stats.succeeded,
            failed: stats.failed,
            success_rate: stats.success_rate,
            failure_rate: stats.failure_rate,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BatchResponse {
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<BatchOutcome>,
    pub stats: BatchStatsResponse,
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct WebhookRequest {
    pub url: String,
    /// Callback that receives the result
    pub webhook_url: String,
    /// Echoed back verbatim in the callback payload
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    pub max_retries: Option<u32>,
    pub skip_ssl: Option<bool>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct WebhookAcceptedResponse {
    pub status: &'static str,
    pub delivery_id: Uuid,
    pub url: String,
    pub webhook_url: String,
}

// ---------------------------------------------------------------------------
// Resolve / decode
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ResolveRequest {
    pub url: String,
    /// Send rotating browser headers (default: true)
    pub enhanced_identity: Option<bool>,
    pub skip_ssl: Option<bool>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ResolveResponse {
    pub original_url: String,
    pub final_url: String,
    pub status_code: u16,
    pub changed: bool,
}

#[derive(Debug, Deserialize, utoipa::ToSchema, utoipa::IntoParams)]
pub struct DecodeRequest {
    pub url: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DecodeResponse {
    pub original_url: String,
    pub decoded_url: String,
    pub is_google_url: bool,
    pub changed: bool,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
    pub features: Vec<&'static str>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
