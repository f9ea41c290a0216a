use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use chrono::Utc;
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use bastion_client::ensure_public;
use bastion_core::batch::{BatchItem, BatchJob, BatchOrchestrator};
use bastion_core::error::AppError;
use bastion_core::models::{FetchRequest, RequestOutcome};
use bastion_core::redirect::decode_google_redirect;
use bastion_core::report::TracingReporter;
use bastion_core::util::parse_http_url;

use crate::dto::{
    BatchRequest, BatchResponse, DecodeRequest, DecodeResponse, HealthResponse, ParseQuery,
    ParseRequest, ParseResponse, ResolveRequest, ResolveResponse, WebhookAcceptedResponse,
    WebhookRequest,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Upper bound for a caller-supplied attempt budget.
pub const MAX_RETRIES_LIMIT: u32 = 10;
/// Largest batch accepted over HTTP. Bigger runs belong in the CLI.
pub const MAX_BATCH_ITEMS: usize = 100;
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/parse", post(parse).get(parse_get))
        .route("/v1/parse/batch", post(parse_batch))
        .route("/v1/parse/webhook", post(parse_webhook))
        .route("/v1/resolve", post(resolve))
        .route(
            "/v1/decode-google-url",
            get(decode_google_url_get).post(decode_google_url_post),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

fn checked_retries(state: &AppState, requested: Option<u32>) -> Result<u32, AppError> {
    let max = requested.unwrap_or(state.config.fetch.max_retries);
    if max > MAX_RETRIES_LIMIT {
        return Err(AppError::InvalidInput(format!(
            "max_retries must be at most {MAX_RETRIES_LIMIT}"
        )));
    }
    Ok(max)
}

fn build_request(
    state: &AppState,
    url: &str,
    max_retries: Option<u32>,
    skip_ssl: Option<bool>,
    timeout_secs: Option<u64>,
) -> Result<FetchRequest, AppError> {
    let timeout = match timeout_secs {
        Some(0) => {
            return Err(AppError::InvalidInput(
                "timeout_secs must be at least 1".into(),
            ));
        }
        Some(secs) => Duration::from_secs(secs),
        None => state.config.fetch.timeout,
    };

    Ok(FetchRequest::new(url)?
        .with_max_retries(checked_retries(state, max_retries)?)
        .with_timeout(timeout)
        .with_insecure_tls(skip_ssl.unwrap_or(false)))
}

/// 200 with the outcome on success, 502 with the same shape on failure.
fn outcome_response(outcome: RequestOutcome) -> Response {
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, axum::Json(ParseResponse::from(outcome))).into_response()
}

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/parse",
    request_body = ParseRequest,
    responses(
        (status = 200, description = "Extraction succeeded", body = ParseResponse),
        (status = 400, description = "Bad request", body = crate::dto::ErrorResponse),
        (status = 502, description = "Retries exhausted", body = ParseResponse),
    ),
    tag = "parse"
)]
pub async fn parse(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<ParseRequest>,
) -> Result<Response, ApiError> {
    let request = build_request(
        &state,
        &body.url,
        body.max_retries,
        body.skip_ssl,
        body.timeout_secs,
    )?
    .with_headers(body.headers.unwrap_or_default());

    let outcome = state.retry.execute(request, &TracingReporter).await;
    Ok(outcome_response(outcome))
}

#[utoipa::path(
    get,
    path = "/v1/parse",
    params(ParseQuery),
    responses(
        (status = 200, description = "Extraction succeeded", body = ParseResponse),
        (status = 400, description = "Bad request", body = crate::dto::ErrorResponse),
        (status = 502, description = "Retries exhausted", body = ParseResponse),
    ),
    tag = "parse"
)]
pub async fn parse_get(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ParseQuery>,
) -> Result<Response, ApiError> {
    let request = build_request(&state, &query.url, query.max_retries, query.skip_ssl, None)?;
    let outcome = state.retry.execute(request, &TracingReporter).await;
    Ok(outcome_response(outcome))
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/parse/batch",
    request_body = BatchRequest,
    responses(
        (status = 200, description = "Per-item outcomes and statistics", body = BatchResponse),
        (status = 400, description = "Bad request", body = crate::dto::ErrorResponse),
    ),
    tag = "parse"
)]
pub async fn parse_batch(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<BatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // `items` first, then plain `urls`, each in the order given.
    let mut items = body.items.unwrap_or_default();
    items.extend(body.urls.unwrap_or_default().into_iter().map(BatchItem::new));

    if items.is_empty() {
        return Err(AppError::InvalidInput(
            "Provide at least one entry in `urls` or `items`".into(),
        )
        .into());
    }
    if items.len() > MAX_BATCH_ITEMS {
        return Err(AppError::InvalidInput(format!(
            "A batch may contain at most {MAX_BATCH_ITEMS} items (got {})",
            items.len()
        ))
        .into());
    }

    let delay = body
        .delay_ms
        .map(Duration::from_millis)
        .unwrap_or(state.config.fetch.inter_request_delay);
    let job = BatchJob::new(items)
        .with_delay(delay)
        .with_max_retries(checked_retries(&state, body.max_retries)?)
        .with_timeout(state.config.fetch.timeout)
        .with_insecure_tls(body.skip_ssl.unwrap_or(false));

    let report = BatchOrchestrator::new(state.retry.clone())
        .run(job, &TracingReporter)
        .await;

    Ok(axum::Json(BatchResponse {
        results: report.outcomes,
        stats: report.stats.into(),
    }))
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/parse/webhook",
    request_body = WebhookRequest,
    responses(
        (status = 202, description = "Accepted; the result is posted to webhook_url", body = WebhookAcceptedResponse),
        (status = 400, description = "Bad request", body = crate::dto::ErrorResponse),
    ),
    tag = "parse"
)]
pub async fn parse_webhook(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<WebhookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = build_request(&state, &body.url, body.max_retries, body.skip_ssl, None)?;
    let target = parse_http_url(&body.webhook_url)?;
    if !state.config.allow_private_urls {
        ensure_public(&target).await?;
    }

    let delivery_id = state.webhooks.dispatch(
        request,
        target.clone(),
        body.metadata.unwrap_or_default(),
    );

    let response = WebhookAcceptedResponse {
        status: "accepted",
        delivery_id,
        url: body.url,
        webhook_url: target.to_string(),
    };

    Ok((StatusCode::ACCEPTED, axum::Json(response)))
}

// ---------------------------------------------------------------------------
// Resolve / decode
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/resolve",
    request_body = ResolveRequest,
    responses(
        (status = 200, description = "Final URL after redirects", body = ResolveResponse),
        (status = 400, description = "Bad request", body = crate::dto::ErrorResponse),
        (status = 502, description = "Target unreachable or answered with an error", body = crate::dto::ErrorResponse),
    ),
    tag = "urls"
)]
pub async fn resolve(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<ResolveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let url = parse_http_url(&body.url)?;
    let resolved = state
        .resolver
        .resolve(
            &url,
            body.enhanced_identity.unwrap_or(true),
            body.skip_ssl.unwrap_or(false),
        )
        .await?;

    Ok(axum::Json(ResolveResponse {
        changed: resolved.changed(),
        original_url: resolved.original_url.to_string(),
        final_url: resolved.final_url.to_string(),
        status_code: resolved.status_code,
    }))
}

fn decode(raw: &str) -> Result<DecodeResponse, AppError> {
    let url = parse_http_url(raw)?;
    let decoded = decode_google_redirect(&url);

    Ok(DecodeResponse {
        original_url: url.to_string(),
        decoded_url: decoded.to_string(),
        is_google_url: url.host_str().is_some_and(|h| h.contains("google.com")),
        changed: decoded != url,
    })
}

#[utoipa::path(
    get,
    path = "/v1/decode-google-url",
    params(DecodeRequest),
    responses(
        (status = 200, description = "Decoded URL", body = DecodeResponse),
        (status = 400, description = "Bad request", body = crate::dto::ErrorResponse),
    ),
    tag = "urls"
)]
pub async fn decode_google_url_get(
    Query(query): Query<DecodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(axum::Json(decode(&query.url)?))
}

#[utoipa::path(
    post,
    path = "/v1/decode-google-url",
    request_body = DecodeRequest,
    responses(
        (status = 200, description = "Decoded URL", body = DecodeResponse),
        (status = 400, description = "Bad request", body = crate::dto::ErrorResponse),
    ),
    tag = "urls"
)]
pub async fn decode_google_url_post(
    axum::Json(body): axum::Json<DecodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(axum::Json(decode(&body.url)?))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health() -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "healthy",
        service: "bastion",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
        features: vec![
            "retry-mechanism",
            "identity-rotation",
            "tls-downgrade",
            "exponential-backoff",
            "batch",
            "webhook",
            "redirect-resolution",
            "google-url-decoding",
        ],
    })
}
