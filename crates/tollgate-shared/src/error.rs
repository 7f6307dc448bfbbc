//! OpenAI-style error bodies: `{"error": {"type": ...}}`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Which limit tripped, for `rate_limit_exceeded` errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl ApiError {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            error: ApiErrorBody {
                kind: kind.into(),
                message: None,
                dimension: None,
                retry_after_ms: None,
            },
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.error.message = Some(message.into());
        self
    }

    // Constructors for the gateway's error vocabulary.

    pub fn invalid_api_key() -> Self {
        Self::new("invalid_api_key")
    }

    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::new("invalid_request").with_message(detail)
    }

    pub fn rate_limit_exceeded(dimension: impl Into<String>, retry_after_ms: u64) -> Self {
        let mut error = Self::new("rate_limit_exceeded").with_message("Rate limit exceeded");
        error.error.dimension = Some(dimension.into());
        error.error.retry_after_ms = Some(retry_after_ms);
        error
    }

    pub fn upstream_unavailable() -> Self {
        Self::new("upstream_unavailable")
    }

    pub fn internal_error() -> Self {
        Self::new("internal_error")
    }
}
