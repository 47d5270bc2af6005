//! Chat Completion API Types
//!
//! This module defines the types of both wire contracts: the client-facing
//! chat completion API this proxy serves, and the upstream API it calls.
//! Optional request fields use `Option` + `skip_serializing_if` so that an
//! absent value is omitted from the JSON entirely instead of sent as `null`.

use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use thiserror::Error;

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Client chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(default)]
    pub stream: bool,
}

/// Chat completion request as sent upstream.
///
/// Every optional field is omitted when `None`. `temperature: Some(0.0)` is
/// a real value and is serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

// ============================================================================
// Upstream response types
// ============================================================================

/// Upstream message; either field may be missing or null
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Upstream choice record
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamChoice {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: UpstreamMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Upstream (non-streaming) chat completion response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamChatResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: serde_json::Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub choices: Vec<UpstreamChoice>,
}

/// Treat an explicit `null` the same as a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Client response types
// ============================================================================

/// Choice in a client chat completion response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub index: usize,
    pub message: ChatMessage,
    pub finish_reason: String,
}

/// Client chat completion response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub usage: serde_json::Value,
    pub choices: Vec<Choice>,
}

// ============================================================================
// Model catalog types
// ============================================================================

/// Model entry. Unknown upstream fields are dropped on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub object: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub owned_by: String,
}

/// Upstream model catalog; only `data` is read
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamModelList {
    pub data: Vec<ModelInfo>,
}

/// Client model catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

// ============================================================================
// Configuration types
// ============================================================================

const DEFAULT_UPSTREAM_BASE_URL: &str = "http://localhost:8000/v1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Startup configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid upstream base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Proxy configuration, fixed for the lifetime of the process
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Upstream base URL without a trailing slash, e.g. `https://host/v1`
    pub upstream_base_url: String,
    pub api_key: Option<String>,
    pub port: u16,
    pub logging_enabled: bool,
    /// Applies to non-streaming upstream calls only
    pub request_timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            upstream_base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            api_key: None,
            port: DEFAULT_PORT,
            logging_enabled: true,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ProxyConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    ///
    /// Recognized keys: `UPSTREAM_BASE_URL`, `UPSTREAM_API_KEY`, `PORT`,
    /// `ENABLE_LOGGING`, `UPSTREAM_TIMEOUT_SECS`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let upstream_base_url = match lookup("UPSTREAM_BASE_URL") {
            Some(url) => normalize_base_url(&url)?,
            None => defaults.upstream_base_url,
        };

        let api_key = lookup("UPSTREAM_API_KEY").filter(|key| !key.trim().is_empty());

        let port = match lookup("PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: "PORT", value })?,
            None => defaults.port,
        };

        let logging_enabled = match lookup("ENABLE_LOGGING") {
            Some(value) => parse_bool(&value).ok_or(ConfigError::InvalidValue {
                key: "ENABLE_LOGGING",
                value,
            })?,
            None => defaults.logging_enabled,
        };

        let request_timeout = match lookup("UPSTREAM_TIMEOUT_SECS") {
            Some(value) => value
                .trim()
                .parse()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidValue {
                    key: "UPSTREAM_TIMEOUT_SECS",
                    value,
                })?,
            None => defaults.request_timeout,
        };

        Ok(Self {
            upstream_base_url,
            api_key,
            port,
            logging_enabled,
            request_timeout,
        })
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = url::Url::parse(trimmed).map_err(|e| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {}", parsed.scheme()),
        });
    }

    Ok(trimmed.to_string())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
