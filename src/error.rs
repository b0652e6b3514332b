//! Request-level error kinds and their HTTP mapping.
//!
//! Every error the caller can observe is rendered as `{"error": "<message>"}`.
//! Once a streaming response has begun, errors are surfaced by terminating
//! the body instead (see `upstream::relay`).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Missing RENDER_API_KEY env var")]
    MissingCredential,

    #[error("Upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("Upstream timed out after {0} ms")]
    Timeout(u64),

    #[error("Upstream stream error: {0}")]
    UpstreamStreamError(String),

    #[error("Payload Too Large")]
    PayloadTooLarge,

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found")]
    NotFound,

    #[error("Request cancelled")]
    Cancelled,

    #[error("{0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Unauthorized => StatusCode::UNAUTHORIZED,
            ProxyError::MissingCredential | ProxyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::UpstreamUnreachable(_)
            | ProxyError::Timeout(_)
            | ProxyError::UpstreamStreamError(_) => StatusCode::BAD_GATEWAY,
            ProxyError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::NotFound => StatusCode::NOT_FOUND,
            ProxyError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Unauthorized => "unauthorized",
            ProxyError::MissingCredential => "missing_credential",
            ProxyError::UpstreamUnreachable(_) => "unreachable",
            ProxyError::Timeout(_) => "timeout",
            ProxyError::UpstreamStreamError(_) => "stream",
            ProxyError::PayloadTooLarge => "payload_too_large",
            ProxyError::BadRequest(_) => "bad_request",
            ProxyError::NotFound => "not_found",
            ProxyError::Cancelled => "cancelled",
            ProxyError::Internal(_) => "internal",
        }
    }
}

/// Render `{"error": message}` with the given status.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        error_response(self.status(), self.to_string())
    }
}
