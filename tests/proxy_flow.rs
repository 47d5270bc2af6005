use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chat_bridge::api_proxy::{create_router, ApiClient, AppState, ProxyConfig};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_json, header as header_eq, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app_for(upstream: &MockServer) -> Router {
    let config = ProxyConfig {
        upstream_base_url: format!("{}/v1", upstream.uri()),
        api_key: Some("test-key".to_string()),
        ..Default::default()
    };
    create_router(AppState {
        client: ApiClient::new(config).expect("client"),
    })
}

fn post_chat(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat/completions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

#[tokio::test]
async fn test_models_end_to_end() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header_eq("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"id": "m1", "object": "model", "created": 1, "owned_by": "x", "root": "m1"}]
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = app_for(&upstream)
        .oneshot(Request::builder().uri("/v1/models").body(Body::empty()).expect("request"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let value: serde_json::Value = serde_json::from_str(&body_string(response).await).expect("json");
    assert_eq!(
        value,
        json!({"object": "list", "data": [{"id": "m1", "object": "model", "created": 1, "owned_by": "x"}]})
    );
}

#[tokio::test]
async fn test_chat_end_to_end() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header_eq("authorization", "Bearer test-key"))
        .and(body_json(json!({
            "model": "m1",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cmpl-1",
            "created": 1700000000,
            "model": "m1",
            "usage": {"prompt_tokens": 1, "completion_tokens": 2, "total_tokens": 3},
            "choices": [{"message": {"role": "assistant", "content": "hello"}}]
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = app_for(&upstream)
        .oneshot(post_chat(json!({
            "model": "m1",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let value: serde_json::Value = serde_json::from_str(&body_string(response).await).expect("json");
    assert_eq!(value["id"], "cmpl-1");
    assert_eq!(value["object"], "chat.completion");
    assert_eq!(value["created"], 1700000000);
    assert_eq!(value["usage"]["total_tokens"], 3);
    assert_eq!(
        value["choices"],
        json!([{"index": 0, "message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}])
    );
}

#[tokio::test]
async fn test_v1_chat_alias_forwards_zero_temperature() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_json(json!({
            "model": "m1",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 0.0,
            "max_tokens": 16
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .expect(1)
        .mount(&upstream)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "model": "m1",
                "messages": [{"role": "user", "content": "hi"}],
                "temperature": 0,
                "max_tokens": 16
            })
            .to_string(),
        ))
        .expect("request");

    let response = app_for(&upstream).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let value: serde_json::Value = serde_json::from_str(&body_string(response).await).expect("json");
    assert_eq!(value["choices"], json!([]));
}

#[tokio::test]
async fn test_null_upstream_fields_are_defaulted() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cmpl-2",
            "choices": [{"message": null, "finish_reason": null}]
        })))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "m1", "object": null, "created": null, "owned_by": null}]
        })))
        .mount(&upstream)
        .await;

    let app = app_for(&upstream);

    let response = app
        .clone()
        .oneshot(post_chat(json!({
            "model": "m1",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let value: serde_json::Value = serde_json::from_str(&body_string(response).await).expect("json");
    assert_eq!(
        value["choices"],
        json!([{"index": 0, "message": {"role": "", "content": ""}, "finish_reason": "stop"}])
    );

    let response = app
        .oneshot(Request::builder().uri("/v1/models").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let value: serde_json::Value = serde_json::from_str(&body_string(response).await).expect("json");
    assert_eq!(
        value["data"],
        json!([{"id": "m1", "object": "", "created": 0, "owned_by": ""}])
    );
}

#[tokio::test]
async fn test_upstream_rejection_is_passed_through() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401).set_body_raw(r#"{"error":"bad token"}"#, "application/json"),
        )
        .mount(&upstream)
        .await;

    let response = app_for(&upstream)
        .oneshot(post_chat(json!({
            "model": "m1",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_string(response).await, r#"{"error":"bad token"}"#);
}

#[tokio::test]
async fn test_models_rejection_is_passed_through() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(503).set_body_raw("maintenance", "text/plain"))
        .mount(&upstream)
        .await;

    let response = app_for(&upstream)
        .oneshot(Request::builder().uri("/v1/models").body(Body::empty()).expect("request"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).expect("content type"),
        "text/plain"
    );
    assert_eq!(body_string(response).await, "maintenance");
}

#[tokio::test]
async fn test_malformed_upstream_body_is_generic_error() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>oops</html>", "text/html"))
        .mount(&upstream)
        .await;

    let response = app_for(&upstream)
        .oneshot(Request::builder().uri("/v1/models").body(Body::empty()).expect("request"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let value: serde_json::Value = serde_json::from_str(&body_string(response).await).expect("json");
    assert_eq!(value, json!({"error": "Failed to fetch models"}));
}

#[tokio::test]
async fn test_streaming_end_to_end() {
    let upstream = MockServer::start().await;
    let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"he\"}}]}\n\n\
               data: {\"choices\":[{\"delta\":{\"content\":\"llo\"}}]}\n\n\
               data: [DONE]\n\n";
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header_eq("accept", "text/event-stream"))
        .and(body_json(json!({
            "model": "m1",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = app_for(&upstream)
        .oneshot(post_chat(json!({
            "model": "m1",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true
        })))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).expect("content type"),
        "text/event-stream"
    );
    assert_eq!(
        body_string(response).await,
        "data: {\"choices\":[{\"delta\":{\"content\":\"he\"}}]}\n\n\
         data: {\"choices\":[{\"delta\":{\"content\":\"llo\"}}]}\n\n\
         data: [DONE]\n\n"
    );
}

#[tokio::test]
async fn test_streaming_rejection_is_plain_error() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429).set_body_raw(r#"{"error":"slow down"}"#, "application/json"),
        )
        .mount(&upstream)
        .await;

    let response = app_for(&upstream)
        .oneshot(post_chat(json!({
            "model": "m1",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true
        })))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).expect("content type"),
        "application/json"
    );
    assert_eq!(body_string(response).await, r#"{"error":"slow down"}"#);
}

#[tokio::test]
async fn test_unreachable_upstream_is_generic_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let config = ProxyConfig {
        upstream_base_url: format!("http://127.0.0.1:{}/v1", port),
        ..Default::default()
    };
    let app = create_router(AppState {
        client: ApiClient::new(config).expect("client"),
    });

    let response = app
        .oneshot(post_chat(json!({
            "model": "m1",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let value: serde_json::Value = serde_json::from_str(&body_string(response).await).expect("json");
    assert_eq!(value, json!({"error": "Failed to process chat completion"}));
}
