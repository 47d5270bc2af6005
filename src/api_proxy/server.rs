//! HTTP Server for API Proxy
//!
//! This module provides the client-facing HTTP server. Each inbound request
//! results in exactly one upstream call; the handler picks the buffered or
//! streaming path from the request's `stream` flag.

use super::client::ApiClient;
use super::convert::generate_request_id;
use super::error::ApiError;
use super::relay::event_stream_response;
use super::types::*;
use axum::{
    extract::{Json, MatchedPath, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

const MODELS_ERROR: &str = "Failed to fetch models";
const CHAT_ERROR: &str = "Failed to process chat completion";

/// Server state
#[derive(Clone)]
pub struct AppState {
    pub client: ApiClient,
}

/// Create the router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/v1/models", get(list_models))
        .route("/chat/completions", post(chat_completions))
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(Arc::new(state))
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Chat completion protocol bridge",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "models": "GET /v1/models",
            "chat": "POST /chat/completions"
        }
    }))
}

/// Model listing endpoint
async fn list_models(State(state): State<Arc<AppState>>) -> Response {
    let request_id = generate_request_id();
    log::info!("[{}] GET /v1/models", request_id);

    match state.client.list_models().await {
        Ok(models) => {
            log::info!("[{}] Returned {} models", request_id, models.data.len());
            Json(models).into_response()
        }
        Err(e) => error_response(&request_id, "list models", e, MODELS_ERROR),
    }
}

/// Chat completion endpoint - handles both streaming and non-streaming
async fn chat_completions(
    State(state): State<Arc<AppState>>,
    path: MatchedPath,
    Json(request): Json<ChatRequest>,
) -> Response {
    let request_id = generate_request_id();
    log::info!("[{}] {}", request_id, describe_chat_request(path.as_str(), &request));

    if request.stream {
        // Upstream status is checked before any stream header is written
        match state.client.send_chat_streaming(&request).await {
            Ok(upstream) => {
                log::debug!("[{}] Upstream stream opened", request_id);
                event_stream_response(upstream.bytes_stream(), request_id)
            }
            Err(e) => error_response(&request_id, "start chat stream", e, CHAT_ERROR),
        }
    } else {
        match state.client.send_chat(&request).await {
            Ok(response) => {
                log::info!(
                    "[{}] Response: model={}, choices={}",
                    request_id,
                    response.model,
                    response.choices.len()
                );
                Json(response).into_response()
            }
            Err(e) => error_response(&request_id, "chat completion", e, CHAT_ERROR),
        }
    }
}

/// Request summary for the log; names the route that was actually hit
fn describe_chat_request(path: &str, request: &ChatRequest) -> String {
    format!(
        "POST {} - model: {}, messages: {}, stream: {}",
        path,
        request.model,
        request.messages.len(),
        request.stream
    )
}

/// Log the failure and convert it to the client response
fn error_response(request_id: &str, operation: &str, error: ApiError, generic: &str) -> Response {
    match &error {
        ApiError::UpstreamRejected { status, .. } => {
            log::warn!("[{}] {} rejected by upstream ({}): {}", request_id, operation, status, error);
        }
        _ => log::error!("[{}] {} failed: {}", request_id, operation, error),
    }
    error.to_client_error(generic).into_response()
}

/// Run the server on the specified address until Ctrl-C
pub async fn run_server(config: ProxyConfig, addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let client = ApiClient::new(config)?;
    log::info!(
        "Forwarding to {} (credential {})",
        client.config().upstream_base_url,
        if client.config().api_key.is_some() { "set" } else { "not set" }
    );

    let state = AppState { client };
    let app = create_router(state);

    log::info!("Starting API proxy server on {}", addr);
    log::info!("Endpoints: GET /v1/models, POST /chat/completions, POST /v1/chat/completions");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server stopped");
    Ok(())
}

/// Run the server with configuration from the environment
pub async fn run_server_from_env() -> Result<(), Box<dyn std::error::Error>> {
    let config = ProxyConfig::from_env()?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    run_server(config, addr).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received");
}
