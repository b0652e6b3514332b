//! Request handlers.
//!
//! | Method | Path                   | Handler              |
//! |--------|------------------------|----------------------|
//! | GET    | `/`                    | [`liveness`]         |
//! | GET    | `/mcp/{secret}/health` | [`health`]           |
//! | ANY    | `/mcp/{secret}`        | [`relay_with_secret`]|
//! | ANY    | `/mcp`                 | [`relay_open`]       |

use std::time::Instant;

use axum::{
    extract::{Path, Request, State},
    http::Method,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ProxyError;
use crate::http::server::AppState;
use crate::http::{CallerRequestId, X_REQUEST_ID};
use crate::observability::metrics;
use crate::security::capture_body;
use crate::upstream::{translate_headers, RelayMode, RelaySession, RelayState, UpstreamResponse};

pub async fn liveness() -> &'static str {
    "ok"
}

pub async fn health(
    State(state): State<AppState>,
    Path(secret): Path<String>,
) -> Result<Json<Value>, ProxyError> {
    state.gate.authorize(&secret)?;
    Ok(Json(json!({ "ok": true, "proxy": true })))
}

pub async fn relay_with_secret(
    State(state): State<AppState>,
    Path(secret): Path<String>,
    request: Request,
) -> Response {
    relay(state, &secret, request).await
}

/// `/mcp` without a secret segment; only passes an open gate.
pub async fn relay_open(State(state): State<AppState>, request: Request) -> Response {
    relay(state, "", request).await
}

pub async fn not_found() -> ProxyError {
    ProxyError::NotFound
}

async fn relay(state: AppState, token: &str, request: Request) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    match forward(&state, token, request, request_id.clone()).await {
        Ok((response, mode)) => {
            metrics::record_request(method.as_str(), response.status().as_u16(), mode.as_str(), start);
            response
        }
        Err(err) => {
            match &err {
                ProxyError::Unauthorized => {
                    tracing::warn!(request_id = %request_id, method = %method, "Rejected by secret gate");
                }
                ProxyError::MissingCredential => {
                    tracing::error!(request_id = %request_id, "RENDER_API_KEY is not configured");
                }
                other => {
                    tracing::debug!(request_id = %request_id, error = %other, "Relay returned error response");
                }
            }
            metrics::record_request(method.as_str(), err.status().as_u16(), "error", start);
            err.into_response()
        }
    }
}

/// Gate → translate → capture body → dispatch → relay.
async fn forward(
    state: &AppState,
    token: &str,
    request: Request,
    request_id: String,
) -> Result<(Response, RelayMode), ProxyError> {
    state.gate.authorize(token)?;

    let (parts, body) = request.into_parts();
    let mut headers = translate_headers(&parts.headers, state.config.upstream.api_key.as_deref())?;
    if parts.extensions.get::<CallerRequestId>().is_none() {
        headers.remove(X_REQUEST_ID);
    }
    let body = if parts.method == Method::GET || parts.method == Method::HEAD {
        None
    } else {
        Some(capture_body(&parts.headers, body, state.config.listener.max_body_bytes).await?)
    };

    let mut session = RelaySession::new(request_id, parts.method.clone(), state.shutdown.child_token());
    let outbound = state
        .dispatcher
        .prepare(parts.method, headers, body, session.cancel_token().clone());

    session.transition(RelayState::Dispatched);
    let response = session.observe(state.dispatcher.dispatch(&outbound).await)?;
    let upstream = UpstreamResponse::receive(response, &outbound, &mut session).await?;

    let mode = upstream.mode();
    tracing::debug!(
        request_id = %session.request_id(),
        status = %upstream.status(),
        mode = mode.as_str(),
        "Upstream responded"
    );
    Ok((upstream.into_response(session), mode))
}
