use serde::{Deserialize, Serialize};

/// Coarse error classes an order API reports in its error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Unavailable,
}

/// JSON error body an order API returns alongside a non-success status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Best-effort extraction of a human readable message from a raw body.
    /// Falls back to the trimmed body text when it is not an `ApiError`.
    pub fn message_from_body(body: &str) -> Option<String> {
        if let Ok(parsed) = serde_json::from_str::<ApiError>(body) {
            return Some(parsed.message);
        }
        let trimmed = body.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}
