//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, panic capture)
//! - Bind server to listener
//! - Stop on the shutdown token, ending in-flight relay streams

use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request},
    http::StatusCode,
    middleware,
    response::Response,
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::error::{error_response, ProxyError};
use crate::http::handlers;
use crate::http::{CallerRequestId, X_REQUEST_ID};
use crate::observability::logging::panic_message;
use crate::security::SecretGate;
use crate::upstream::Dispatcher;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub gate: Arc<SecretGate>,
    pub dispatcher: Arc<Dispatcher>,
    /// Parent of every relay session's cancellation token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: ProxyConfig, shutdown: CancellationToken) -> Result<Self, ProxyError> {
        let dispatcher = Dispatcher::new(&config.upstream)?;
        let gate = SecretGate::new(config.security.path_secret.clone());
        Ok(Self {
            config: Arc::new(config),
            gate: Arc::new(gate),
            dispatcher: Arc::new(dispatcher),
            shutdown,
        })
    }
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig, shutdown: CancellationToken) -> Result<Self, ProxyError> {
        let state = AppState::new(config, shutdown)?;
        let router = Self::build_router(state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", get(handlers::liveness))
            .route("/mcp", any(handlers::relay_open))
            .route("/mcp/{secret}", any(handlers::relay_with_secret))
            .route("/mcp/{secret}/health", get(handlers::health))
            .fallback(handlers::not_found)
            .with_state(state)
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(middleware::map_request(mark_caller_request_id))
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.state.dispatcher.url(),
            timeout_ms = self.state.dispatcher.timeout().as_millis() as u64,
            gate_open = self.state.gate.is_open(),
            "HTTP server starting"
        );

        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.state.config
    }
}

// Runs before the request id layer fills in a generated value.
async fn mark_caller_request_id(mut request: Request) -> Request {
    if request.headers().contains_key(X_REQUEST_ID) {
        request.extensions_mut().insert(CallerRequestId);
    }
    request
}

// Uses the route template so the path secret never reaches the logs.
fn request_span(request: &Request) -> tracing::Span {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or("<unmatched>");
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    tracing::info_span!(
        "request",
        method = %request.method(),
        route,
        request_id,
    )
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic_message(payload.as_ref());
    tracing::error!(panic = %message, "Handler panicked");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
}
