//! API Proxy Module
//!
//! This module translates between a client-facing chat completion API and an
//! upstream service exposing a similar, but not identical, contract.
//!
//! # Features
//!
//! - **Model Listing**: `GET /v1/models` returns the upstream catalog reduced
//!   to `id`, `object`, `created` and `owned_by`.
//!
//! - **Request/Response Conversion**: optional request fields are forwarded
//!   only when present (a zero temperature included); responses get stable
//!   choice indexes and a default `finish_reason` of `"stop"`.
//!
//! - **Streaming Support**: server-sent events are re-framed across arbitrary
//!   chunk boundaries, never split or merged, and terminated by `data: [DONE]`.
//!
//! - **Error Pass-through**: upstream error statuses and bodies reach the
//!   client untouched; local failures become a generic 500.
//!
//! # Usage
//!
//! ## As a standalone HTTP server
//!
//! ```no_run
//! use chat_bridge::api_proxy::server;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Run with config from environment
//!     server::run_server_from_env().await.unwrap();
//! }
//! ```
//!
//! ## As a library
//!
//! ```no_run
//! use chat_bridge::api_proxy::{client::ApiClient, types::*};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = ApiClient::new(ProxyConfig::from_env().unwrap()).unwrap();
//!
//!     let request = ChatRequest {
//!         model: "m1".to_string(),
//!         messages: vec![ChatMessage {
//!             role: "user".to_string(),
//!             content: "Hello!".to_string(),
//!         }],
//!         temperature: Some(0.0),
//!         max_tokens: None,
//!         stream: false,
//!     };
//!
//!     let response = client.send_chat(&request).await.unwrap();
//!     println!("Response: {:?}", response);
//! }
//! ```
//!
//! # Configuration
//!
//! The proxy can be configured via environment variables (or a `.env` file
//! when started through the binary):
//!
//! - `UPSTREAM_BASE_URL`: Upstream base URL (default: `http://localhost:8000/v1`)
//! - `UPSTREAM_API_KEY`: Bearer credential forwarded upstream
//! - `PORT`: Listening port (default: 3000)
//! - `ENABLE_LOGGING`: `true`/`false` (default: true)
//! - `UPSTREAM_TIMEOUT_SECS`: Timeout for non-streaming calls (default: 300)

pub mod client;
pub mod convert;
pub mod error;
pub mod relay;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use client::ApiClient;
pub use error::{ApiError, ClientError};
pub use relay::{EventBuffer, Utf8Decoder};
pub use server::{create_router, run_server, run_server_from_env, AppState};
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, Choice, ConfigError, ModelInfo, ModelList,
    ProxyConfig, UpstreamChatRequest,
};
