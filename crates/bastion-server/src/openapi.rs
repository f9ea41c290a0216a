use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bastion API",
        version = "0.2.0",
        description = "Resilient fetch orchestration in front of a content extraction service."
    ),
    paths(
        crate::routes::parse,
        crate::routes::parse_get,
        crate::routes::parse_batch,
        crate::routes::parse_webhook,
        crate::routes::resolve,
        crate::routes::decode_google_url_get,
        crate::routes::decode_google_url_post,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::ParseRequest,
        crate::dto::ParseResponse,
        crate::dto::BatchRequest,
        crate::dto::BatchResponse,
        crate::dto::BatchStatsResponse,
        crate::dto::WebhookRequest,
        crate::dto::WebhookAcceptedResponse,
        crate::dto::ResolveRequest,
        crate::dto::ResolveResponse,
        crate::dto::DecodeRequest,
        crate::dto::DecodeResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "parse", description = "Extraction with retry, batching and callbacks"),
        (name = "urls", description = "Redirect resolution and Google link decoding"),
        (name = "system", description = "Health and system status"),
    )
)]
pub struct ApiDoc;
