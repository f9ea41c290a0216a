use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use wiremock::MockServer;

use bastion_server::config::ServerConfig;
use bastion_server::routes;
use bastion_server::state::AppState;

/// Router plus the mock extraction service it talks to.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub extractor: MockServer,
}

impl TestApp {
    /// Send one request through a clone of the router and decode the JSON body.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

/// App with private outbound targets allowed, so wiremock servers on
/// localhost can act as webhook and redirect targets.
pub async fn setup_test_app() -> TestApp {
    setup(true, None).await
}

/// App with the default outbound policy.
pub async fn setup_test_app_strict() -> TestApp {
    setup(false, None).await
}

/// App that refuses URLs on the given comma-separated domains.
pub async fn setup_test_app_with_blocklist(domains: &str) -> TestApp {
    setup(true, Some(domains.to_string())).await
}

async fn setup(allow_private_urls: bool, blocked_domains: Option<String>) -> TestApp {
    let extractor = MockServer::start().await;
    let extractor_url = format!("{}/extract", extractor.uri());
    let allow = allow_private_urls.to_string();

    let config = ServerConfig::from_lookup(|key| match key {
        "BASTION_EXTRACTOR_URL" => Some(extractor_url.clone()),
        "BASTION_DELAY_MS" => Some("0".into()),
        "BASTION_MAX_RETRIES" => Some("1".into()),
        "BASTION_TIMEOUT_SECS" => Some("5".into()),
        "BASTION_ALLOW_PRIVATE_URLS" => Some(allow.clone()),
        "BASTION_BLOCKED_DOMAINS" => blocked_domains.clone(),
        _ => None,
    })
    .expect("test config");

    let state = Arc::new(AppState::new(config).expect("app state"));
    let router = routes::router(state.clone());

    TestApp {
        router,
        state,
        extractor,
    }
}
