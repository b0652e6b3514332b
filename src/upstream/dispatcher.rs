//! Outbound call to the fixed upstream.
//!
//! # Responsibilities
//! - Build the outbound request (method, translated headers, raw body)
//! - Enforce the deadline; an expired call is dropped, which aborts it
//! - Abort when the exchange's cancellation token fires
//! - Map transport failures onto `ProxyError`
//!
//! # Design Decisions
//! - One shared `reqwest::Client`; it owns the connection pool
//! - No retries: a single best-effort attempt
//! - Redirects are relayed, not followed

use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use reqwest::{redirect, Client, Url};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::UpstreamConfig;
use crate::error::ProxyError;

/// A request ready to be sent upstream.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Duration,
    pub deadline: Instant,
    pub cancel: CancellationToken,
}

/// Sends [`OutboundRequest`]s to the configured upstream URL.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(config: &UpstreamConfig) -> Result<Self, ProxyError> {
        let url = Url::parse(&config.url)
            .map_err(|e| ProxyError::Internal(format!("invalid upstream URL: {}", e)))?;

        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .no_proxy()
            .connect_timeout(config.timeout())
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| ProxyError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url,
            timeout: config.timeout(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Derive the outbound request. GET and HEAD never carry a body.
    pub fn prepare(
        &self,
        method: Method,
        headers: HeaderMap,
        body: Option<Bytes>,
        cancel: CancellationToken,
    ) -> OutboundRequest {
        let body = if method == Method::GET || method == Method::HEAD {
            None
        } else {
            Some(body.unwrap_or_default())
        };

        OutboundRequest {
            method,
            headers,
            body,
            timeout: self.timeout,
            deadline: Instant::now() + self.timeout,
            cancel,
        }
    }

    /// Issue the call and wait for status and headers.
    pub async fn dispatch(&self, request: &OutboundRequest) -> Result<reqwest::Response, ProxyError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        tracing::debug!(
            method = %request.method,
            url = %self.url,
            body_bytes = request.body.as_ref().map(|b| b.len()).unwrap_or(0),
            "Dispatching upstream request"
        );

        tokio::select! {
            biased;
            _ = request.cancel.cancelled() => Err(ProxyError::Cancelled),
            result = tokio::time::timeout_at(request.deadline, builder.send()) => match result {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => Err(map_send_error(e, request.timeout)),
                Err(_) => Err(ProxyError::Timeout(request.timeout.as_millis() as u64)),
            },
        }
    }
}

pub(crate) fn map_send_error(err: reqwest::Error, timeout: Duration) -> ProxyError {
    if err.is_timeout() {
        ProxyError::Timeout(timeout.as_millis() as u64)
    } else if err.is_builder() {
        ProxyError::Internal(format!("failed to build upstream request: {}", err))
    } else {
        ProxyError::UpstreamUnreachable(error_chain(&err))
    }
}

/// Render an error with its sources, e.g. "error sending request: connection refused".
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(e) = source {
        let text = e.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = e.source();
    }
    message
}
