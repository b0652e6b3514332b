//! Header translation between the two legs of the relay.
//!
//! # Outbound (caller → upstream)
//! 1. Drop `host`, `connection`, `content-length`
//! 2. Copy everything else, joining repeated values with `,`
//! 3. Set `Authorization: Bearer <api key>` (missing key is fatal)
//! 4. Default `Accept: text/event-stream`
//!
//! # Inbound (upstream → caller)
//! - `transfer-encoding` is never copied; the relay owns framing
//! - Buffered bodies also lose `content-length`, hyper recomputes it
//! - Streaming responses gain `Cache-Control: no-cache` and `Connection: keep-alive`

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::error::ProxyError;
use crate::upstream::relay::RelayMode;

pub const EVENT_STREAM: &str = "text/event-stream";

fn is_dropped_outbound(name: &HeaderName) -> bool {
    name == header::HOST || name == header::CONNECTION || name == header::CONTENT_LENGTH
}

/// Build the outbound header set for the upstream call.
pub fn translate_headers(inbound: &HeaderMap, api_key: Option<&str>) -> Result<HeaderMap, ProxyError> {
    let api_key = api_key.ok_or(ProxyError::MissingCredential)?;

    let mut outbound = HeaderMap::with_capacity(inbound.keys_len() + 2);
    for name in inbound.keys() {
        if is_dropped_outbound(name) {
            continue;
        }
        outbound.insert(name.clone(), join_values(inbound, name)?);
    }

    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|_| {
        ProxyError::Internal("RENDER_API_KEY is not a valid header value".to_string())
    })?;
    bearer.set_sensitive(true);
    outbound.insert(header::AUTHORIZATION, bearer);

    if !outbound.contains_key(header::ACCEPT) {
        outbound.insert(header::ACCEPT, HeaderValue::from_static(EVENT_STREAM));
    }

    Ok(outbound)
}

fn join_values(headers: &HeaderMap, name: &HeaderName) -> Result<HeaderValue, ProxyError> {
    let mut values = headers.get_all(name).iter();
    let first = match values.next() {
        Some(v) => v,
        None => return Ok(HeaderValue::from_static("")),
    };

    let rest: Vec<&HeaderValue> = values.collect();
    if rest.is_empty() {
        return Ok(first.clone());
    }

    let mut joined = first.as_bytes().to_vec();
    for value in rest {
        joined.push(b',');
        joined.extend_from_slice(value.as_bytes());
    }
    HeaderValue::from_bytes(&joined)
        .map_err(|_| ProxyError::BadRequest(format!("invalid value for header {}", name)))
}

/// Headers sent back to the caller for an upstream response relayed in `mode`.
pub fn response_headers(upstream: &HeaderMap, mode: RelayMode) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len() + 2);
    for (name, value) in upstream {
        if name == header::TRANSFER_ENCODING {
            continue;
        }
        if mode == RelayMode::Buffered && name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    if mode == RelayMode::Streaming {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    }

    headers
}
