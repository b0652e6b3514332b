//! Request body capture with a size limit.
//!
//! The raw body is buffered so it can be forwarded byte-for-byte. Bodies
//! larger than the configured limit are rejected with 413 before any
//! upstream call is made.

use std::error::Error as StdError;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap};
use http_body_util::LengthLimitError;

use crate::error::ProxyError;

/// Read the whole inbound body, refusing anything over `limit` bytes.
pub async fn capture_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Bytes, ProxyError> {
    // Reject early when the declared length already exceeds the limit.
    if let Some(declared) = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
    {
        if declared > limit {
            return Err(ProxyError::PayloadTooLarge);
        }
    }

    axum::body::to_bytes(body, limit).await.map_err(|e| {
        if exceeds_limit(&e) {
            ProxyError::PayloadTooLarge
        } else {
            ProxyError::BadRequest(format!("failed to read request body: {}", e))
        }
    })
}

/// Whether `err` or any of its sources is a body length limit violation.
fn exceeds_limit(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}
