use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::integration::common::{
    get, post_json, setup_test_app, setup_test_app_strict, setup_test_app_with_blocklist,
};

fn article(title: &str) -> serde_json::Value {
    json!({
        "success": true,
        "data": {"title": title, "word_count": 250}
    })
}

fn upstream_failure(status: u16, error: &str) -> serde_json::Value {
    json!({"success": false, "error": error, "status_code": status})
}

async fn mount_extraction(server: &MockServer, url: &str, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/extract"))
        .and(body_partial_json(json!({ "url": url })))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let (status, json) = app.send(get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "bastion");
    assert!(json["features"].as_array().unwrap().len() >= 4);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_test_app().await;

    let (status, json) = app.send(get("/api-docs/openapi.json")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/v1/parse"].is_object());
    assert!(json["paths"]["/v1/parse/webhook"].is_object());
}

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

#[tokio::test]
async fn parse_success_returns_200() {
    let app = setup_test_app().await;
    mount_extraction(&app.extractor, "https://news.example.com/a/1", article("Hello")).await;

    let (status, json) = app
        .send(post_json(
            "/v1/parse",
            json!({"url": "https://news.example.com/a/1"}),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["title"], "Hello");
    assert_eq!(json["attempts"], 1);
    assert_eq!(json["retries"], 0);
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn parse_sends_identity_and_override_headers() {
    let app = setup_test_app().await;
    Mock::given(method("POST"))
        .and(path("/extract"))
        .and(body_partial_json(json!({
            "headers": {"Cookie": "consent=1", "Referer": "https://news.example.com/"},
            "skip_ssl": true,
            "timeout_secs": 7
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(article("ok")))
        .expect(1)
        .mount(&app.extractor)
        .await;

    let (status, _) = app
        .send(post_json(
            "/v1/parse",
            json!({
                "url": "https://news.example.com/a/1",
                "skip_ssl": true,
                "timeout_secs": 7,
                "headers": {"Cookie": "consent=1"}
            }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn parse_failure_returns_502_with_outcome_shape() {
    let app = setup_test_app().await;
    mount_extraction(
        &app.extractor,
        "https://news.example.com/gone",
        upstream_failure(404, "Client error '404 Not Found'"),
    )
    .await;

    let (status, json) = app
        .send(post_json(
            "/v1/parse",
            json!({"url": "https://news.example.com/gone", "max_retries": 1}),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["success"], false);
    assert_eq!(json["attempts"], 1);
    assert!(json["error"].as_str().unwrap().contains("404"));
    assert!(json.get("data").is_none());
}

#[tokio::test]
async fn parse_retries_after_upstream_error() {
    let app = setup_test_app().await;
    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(upstream_failure(500, "Server error '500 Internal Server Error'")),
        )
        .up_to_n_times(1)
        .mount(&app.extractor)
        .await;
    mount_extraction(&app.extractor, "https://news.example.com/a/2", article("Second")).await;

    let (status, json) = app
        .send(post_json(
            "/v1/parse",
            json!({"url": "https://news.example.com/a/2", "max_retries": 2}),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["attempts"], 2);
    assert_eq!(json["retries"], 1);
    assert_eq!(json["data"]["title"], "Second");
}

#[tokio::test]
async fn parse_get_uses_query_parameters() {
    let app = setup_test_app().await;
    mount_extraction(&app.extractor, "https://news.example.com/a/3", article("Query")).await;

    let (status, json) = app
        .send(get(
            "/v1/parse?url=https%3A%2F%2Fnews.example.com%2Fa%2F3&max_retries=1",
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["title"], "Query");
}

#[tokio::test]
async fn parse_rejects_invalid_input() {
    let app = setup_test_app().await;

    let (status, json) = app
        .send(post_json("/v1/parse", json!({"url": "ftp://example.com/x"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_input");

    let (status, _) = app
        .send(post_json(
            "/v1/parse",
            json!({"url": "https://example.com", "max_retries": 50}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let requests = app.extractor.received_requests().await.unwrap();
    assert!(requests.is_empty());
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn batch_isolates_failures_and_keeps_order() {
    let app = setup_test_app().await;
    mount_extraction(&app.extractor, "https://a.example.com/1", article("One")).await;
    mount_extraction(
        &app.extractor,
        "https://a.example.com/2",
        upstream_failure(404, "Client error '404 Not Found'"),
    )
    .await;
    mount_extraction(&app.extractor, "https://a.example.com/3", article("Three")).await;

    let (status, json) = app
        .send(post_json(
            "/v1/parse/batch",
            json!({
                "items": [
                    {"url": "https://a.example.com/1", "id": 1, "source": "feed"},
                    {"url": "https://a.example.com/2", "id": 2},
                    {"url": "https://a.example.com/3", "id": 3}
                ],
                "delay_ms": 0,
                "max_retries": 1
            }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["id"], 1);
    assert_eq!(results[0]["source"], "feed");
    assert_eq!(results[0]["data"]["title"], "One");
    assert_eq!(results[1]["id"], 2);
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[2]["id"], 3);
    assert_eq!(results[2]["success"], true);

    assert_eq!(json["stats"]["total"], 3);
    assert_eq!(json["stats"]["succeeded"], 2);
    assert_eq!(json["stats"]["failed"], 1);
}

#[tokio::test]
async fn batch_accepts_plain_urls_and_invalid_entries() {
    let app = setup_test_app().await;
    mount_extraction(&app.extractor, "https://a.example.com/ok", article("Ok")).await;

    let (status, json) = app
        .send(post_json(
            "/v1/parse/batch",
            json!({"urls": ["https://a.example.com/ok", "not-a-url"], "delay_ms": 0}),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    let results = json["results"].as_array().unwrap();
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[1]["attempts_made"], 0);
}

#[tokio::test]
async fn batch_skips_blocklisted_domains_without_calling_the_service() {
    let app = setup_test_app_with_blocklist("reuters.com").await;
    mount_extraction(&app.extractor, "https://a.example.com/ok", article("Ok")).await;

    let (status, json) = app
        .send(post_json(
            "/v1/parse/batch",
            json!({
                "urls": ["https://www.reuters.com/world/x", "https://a.example.com/ok"],
                "delay_ms": 0
            }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    let results = json["results"].as_array().unwrap();
    assert_eq!(results[0]["success"], false);
    assert_eq!(results[0]["attempts_made"], 0);
    assert!(
        results[0]["error"]
            .as_str()
            .unwrap()
            .contains("blocklisted")
    );
    assert_eq!(results[1]["success"], true);

    let received = app.extractor.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
}

#[tokio::test]
async fn batch_without_urls_returns_400() {
    let app = setup_test_app().await;

    let (status, json) = app
        .send(post_json("/v1/parse/batch", json!({"urls": []})))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_input");
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

#[tokio::test]
async fn webhook_is_acknowledged_before_delivery() {
    let app = setup_test_app().await;
    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(article("Later"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&app.extractor)
        .await;

    let hooks = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&hooks)
        .await;

    let (status, json) = app
        .send(post_json(
            "/v1/parse/webhook",
            json!({
                "url": "https://news.example.com/a/9",
                "webhook_url": format!("{}/hook", hooks.uri()),
                "metadata": {"row": 42}
            }),
        ))
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "accepted");
    assert!(json["delivery_id"].is_string());
    assert!(hooks.received_requests().await.unwrap().is_empty());

    app.state.webhooks.shutdown().await;

    let delivered = hooks.received_requests().await.unwrap();
    assert_eq!(delivered.len(), 1);
    let payload: serde_json::Value = delivered[0].body_json().unwrap();
    assert_eq!(payload["success"], true);
    assert_eq!(payload["original_url"], "https://news.example.com/a/9");
    assert_eq!(payload["metadata"]["row"], 42);
    assert_eq!(payload["parsed_data"]["title"], "Later");
    assert_eq!(payload["attempts"], 1);
}

#[tokio::test]
async fn webhook_failure_sends_one_failure_notice() {
    let app = setup_test_app().await;
    mount_extraction(&app.extractor, "https://news.example.com/a/10", article("ok")).await;

    let hooks = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&hooks)
        .await;

    let (status, _) = app
        .send(post_json(
            "/v1/parse/webhook",
            json!({
                "url": "https://news.example.com/a/10",
                "webhook_url": format!("{}/hook", hooks.uri())
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    app.state.webhooks.shutdown().await;

    let delivered = hooks.received_requests().await.unwrap();
    assert_eq!(delivered.len(), 2);
    let fallback: serde_json::Value = delivered[1].body_json().unwrap();
    assert_eq!(fallback["success"], false);
    assert!(fallback["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn webhook_to_private_address_is_rejected() {
    let app = setup_test_app_strict().await;

    let (status, json) = app
        .send(post_json(
            "/v1/parse/webhook",
            json!({
                "url": "https://news.example.com/a/11",
                "webhook_url": "http://127.0.0.1:9/hook"
            }),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("blocked"));
    assert_eq!(app.state.webhooks.in_flight(), 0);
}

// ---------------------------------------------------------------------------
// Resolve / decode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resolve_follows_redirects() {
    let app = setup_test_app().await;
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/short"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/article"))
        .mount(&target)
        .await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&target)
        .await;

    let (status, json) = app
        .send(post_json(
            "/v1/resolve",
            json!({"url": format!("{}/short", target.uri())}),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["final_url"], format!("{}/article", target.uri()));
    assert_eq!(json["status_code"], 200);
    assert_eq!(json["changed"], true);
}

#[tokio::test]
async fn resolve_error_status_returns_502() {
    let app = setup_test_app().await;
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&target)
        .await;

    let (status, json) = app
        .send(post_json(
            "/v1/resolve",
            json!({"url": format!("{}/missing", target.uri()), "enhanced_identity": false}),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "upstream_error");
}

#[tokio::test]
async fn decode_google_url_get_and_post() {
    let app = setup_test_app().await;

    let (status, json) = app
        .send(get(
            "/v1/decode-google-url?url=https%3A%2F%2Fwww.google.com%2Furl%3Furl%3Dhttps%3A%2F%2Fexample.com%2Fstory%26ct%3Dga",
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["decoded_url"], "https://example.com/story");
    assert_eq!(json["is_google_url"], true);
    assert_eq!(json["changed"], true);

    let (status, json) = app
        .send(post_json(
            "/v1/decode-google-url",
            json!({"url": "https://example.com/plain"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["decoded_url"], "https://example.com/plain");
    assert_eq!(json["is_google_url"], false);
    assert_eq!(json["changed"], false);
}
