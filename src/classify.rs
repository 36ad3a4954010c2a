use serde::Deserialize;
use tracing::warn;

use crate::error::{ChatError, ScoringError};

/// Substring the backend puts in its error detail when the assistant
/// credential is missing.
pub const CREDENTIAL_MARKER: &str = "API key";

const GENERIC_CHAT_FAILURE: &str = "Failed to get a response from the assistant";
const GENERIC_SERVER_FAILURE: &str = "Server error";
const GENERIC_INVALID_INPUT: &str = "Invalid input data. Please check your values.";

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Pulls a `detail` string out of a JSON error body, if there is one.
pub fn detail_message(raw_body: &str) -> Option<String> {
    let body: ErrorBody = serde_json::from_str(raw_body).ok()?;
    match body.detail? {
        serde_json::Value::String(detail) if !detail.trim().is_empty() => Some(detail),
        _ => None,
    }
}

/// `status` is `None` when no response arrived; `raw_body` then holds the
/// transport error text.
pub fn classify_chat(status: Option<u16>, raw_body: &str) -> ChatError {
    let Some(status) = status else {
        return ChatError::Connectivity(non_empty_or(raw_body, "no response received"));
    };

    if status == 500 && raw_body.contains(CREDENTIAL_MARKER) {
        return ChatError::Configuration;
    }

    match status {
        504 => ChatError::Timeout,
        401 => ChatError::Auth,
        _ => {
            let message = detail_message(raw_body)
                .unwrap_or_else(|| non_empty_or(raw_body, GENERIC_CHAT_FAILURE));
            ChatError::Backend { status, message }
        }
    }
}

pub fn classify_scoring(status: Option<u16>, raw_body: &str) -> ScoringError {
    match status {
        None => {
            let error = non_empty_or(raw_body, "no response received");
            warn!(%error, "prediction service unreachable");
            ScoringError::Connectivity
        }
        Some(403) => {
            warn!(status = 403, "prediction service refused the request");
            ScoringError::Connectivity
        }
        Some(503) => ScoringError::ServiceUnavailable,
        Some(422) => ScoringError::InvalidInput(
            detail_message(raw_body).unwrap_or_else(|| GENERIC_INVALID_INPUT.to_string()),
        ),
        Some(status) => ScoringError::Server {
            status,
            message: detail_message(raw_body).unwrap_or_else(|| GENERIC_SERVER_FAILURE.to_string()),
        },
    }
}

fn non_empty_or(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
