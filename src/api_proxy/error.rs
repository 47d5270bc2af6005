//! Error types and the mapping from upstream failures to client responses.
//!
//! Upstream rejections are passed through verbatim (status, content type and
//! body). Everything else becomes a 500 with a generic `{"error": ...}` body;
//! the detailed reason only goes to the log.

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Failures at the upstream boundary
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Upstream answered with a non-success status
    #[error("upstream returned {status}: {}", String::from_utf8_lossy(.body))]
    UpstreamRejected {
        status: u16,
        content_type: Option<HeaderValue>,
        body: Bytes,
    },

    /// Request could not be sent or the connection failed
    #[error("transport failure: {0}")]
    Transport(String),

    /// Upstream body did not have the expected shape
    #[error("invalid upstream response: {0}")]
    Parse(String),

    /// Upstream body failed after the client stream had started
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ApiError::Parse(error.to_string())
        } else {
            ApiError::Transport(error.to_string())
        }
    }
}

/// Error response as the client sees it
#[derive(Debug, Clone)]
pub struct ClientError {
    pub status: StatusCode,
    pub content_type: HeaderValue,
    pub body: Bytes,
}

impl ApiError {
    /// Map to the client-visible response.
    ///
    /// `generic_message` is the only text a client gets for local failures.
    pub fn to_client_error(&self, generic_message: &str) -> ClientError {
        match self {
            ApiError::UpstreamRejected {
                status,
                content_type,
                body,
            } => ClientError {
                status: StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                content_type: content_type
                    .clone()
                    .unwrap_or_else(|| HeaderValue::from_static("application/json")),
                body: body.clone(),
            },
            ApiError::Transport(_) | ApiError::Parse(_) | ApiError::StreamInterrupted(_) => {
                ClientError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    content_type: HeaderValue::from_static("application/json"),
                    body: Bytes::from(json!({ "error": generic_message }).to_string()),
                }
            }
        }
    }
}

impl IntoResponse for ClientError {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, self.content_type);
        response
    }
}
