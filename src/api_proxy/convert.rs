//! Request/Response Conversion
//!
//! This module handles conversion between the client chat completion format
//! and the upstream format. Everything here is pure: no I/O, no failure on
//! well-formed input.

use super::types::*;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Placeholder id used when the upstream response carries none
pub const PLACEHOLDER_COMPLETION_ID: &str = "chatcmpl-unknown";

/// Finish reason reported when the upstream choice has none
pub const DEFAULT_FINISH_REASON: &str = "stop";

/// Map the upstream model catalog to the client catalog.
///
/// Each entry keeps only `id`, `object`, `created` and `owned_by`, in
/// upstream order.
pub fn convert_model_list(upstream: UpstreamModelList) -> ModelList {
    ModelList {
        object: "list".to_string(),
        data: upstream
            .data
            .into_iter()
            .map(|model| ModelInfo {
                id: model.id,
                object: model.object,
                created: model.created,
                owned_by: model.owned_by,
            })
            .collect(),
    }
}

/// Convert a client chat request to the upstream format.
///
/// Model and messages are copied verbatim. `temperature` and `max_tokens`
/// keep their presence exactly (zero included); `stream` is only sent when
/// the client asked for a stream.
pub fn convert_request_to_upstream(request: &ChatRequest) -> UpstreamChatRequest {
    UpstreamChatRequest {
        model: request.model.clone(),
        messages: request.messages.clone(),
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        stream: request.stream.then_some(true),
    }
}

/// Convert an upstream chat response to the client format
pub fn convert_response_to_client(
    response: UpstreamChatResponse,
    requested_model: &str,
) -> ChatResponse {
    let choices = response
        .choices
        .into_iter()
        .enumerate()
        .map(|(index, choice)| Choice {
            index,
            message: ChatMessage {
                role: choice.message.role.unwrap_or_default(),
                content: choice.message.content.unwrap_or_default(),
            },
            finish_reason: choice
                .finish_reason
                .unwrap_or_else(|| DEFAULT_FINISH_REASON.to_string()),
        })
        .collect();

    ChatResponse {
        id: response
            .id
            .unwrap_or_else(|| PLACEHOLDER_COMPLETION_ID.to_string()),
        object: "chat.completion".to_string(),
        created: response.created.unwrap_or_else(unix_now),
        model: response
            .model
            .unwrap_or_else(|| requested_model.to_string()),
        usage: response.usage,
        choices,
    }
}

/// Current wall-clock time in whole seconds
fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Generate a short id used to correlate log lines of one request
pub fn generate_request_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
