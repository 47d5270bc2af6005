//! HTTP Client for upstream API requests
//!
//! This module makes the upstream calls: model listing and chat completions
//! (buffered or streaming). Exactly one request per call, no retries.

use super::convert::{convert_model_list, convert_request_to_upstream, convert_response_to_client};
use super::error::ApiError;
use super::types::*;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use std::sync::Arc;
use std::time::Duration;

/// Client identification sent with every upstream request
const CLIENT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// API client for the upstream service
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: Arc<ProxyConfig>,
}

impl ApiClient {
    /// Create a new API client with the given configuration
    pub fn new(config: ProxyConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(CLIENT_USER_AGENT)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.upstream_base_url, path)
    }

    /// Request builder with credential attached
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.client.request(method, self.url(path));
        match self.config.api_key.as_deref() {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    /// Fetch the upstream model catalog
    pub async fn list_models(&self) -> Result<ModelList, ApiError> {
        let response = self
            .request(Method::GET, "models")
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        let response = ensure_success(response).await?;
        let catalog: UpstreamModelList = response.json().await?;

        Ok(convert_model_list(catalog))
    }

    /// Send a non-streaming chat completion request
    pub async fn send_chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        let upstream_request = convert_request_to_upstream(request);

        let response = self
            .request(Method::POST, "chat/completions")
            .timeout(self.config.request_timeout)
            .json(&upstream_request)
            .send()
            .await?;

        let response = ensure_success(response).await?;
        let upstream_response: UpstreamChatResponse = response.json().await?;

        Ok(convert_response_to_client(upstream_response, &request.model))
    }

    /// Start a streaming chat completion.
    ///
    /// Returns the upstream response once its status is known to be a
    /// success; the caller owns the body stream from here on.
    pub async fn send_chat_streaming(&self, request: &ChatRequest) -> Result<Response, ApiError> {
        let mut upstream_request = convert_request_to_upstream(request);
        upstream_request.stream = Some(true);

        let response = self
            .request(Method::POST, "chat/completions")
            .header(header::ACCEPT, "text/event-stream")
            .json(&upstream_request)
            .send()
            .await?;

        ensure_success(response).await
    }
}

/// Turn a non-success upstream response into `ApiError::UpstreamRejected`,
/// keeping the body bytes untouched. A body that cannot be read in full is a
/// transport failure, not a rejection with an empty body.
async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
    let body = response.bytes().await.map_err(|e| {
        ApiError::Transport(format!(
            "failed to read upstream error body (status {}): {}",
            status.as_u16(),
            e
        ))
    })?;

    Err(ApiError::UpstreamRejected {
        status: status.as_u16(),
        content_type,
        body,
    })
}
