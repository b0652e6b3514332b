//! Response relay: upstream response → caller response.
//!
//! # Data Flow
//! ```text
//! reqwest::Response (status + headers)
//!     → RelayMode::classify
//!         ├─ Streaming: body handed over as a live byte stream
//!         └─ Buffered:  body collected (bounded by the deadline)
//!     → UpstreamResponse::into_response
//!         ├─ Streaming: Body::from_stream(RelayStream)
//!         └─ Buffered:  Body::from(bytes)
//! ```
//!
//! # Design Decisions
//! - The streaming body is pulled by hyper, so a slow caller stops upstream reads
//! - Dropping the body drops the upstream stream and the session with it
//! - An upstream error after headers went out ends the connection abruptly

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use futures_util::future::FutureExt;
use futures_util::stream::{BoxStream, Stream, StreamExt};
use tokio_util::sync::WaitForCancellationFutureOwned;

use crate::error::ProxyError;
use crate::upstream::dispatcher::{error_chain, map_send_error, OutboundRequest};
use crate::upstream::headers::{response_headers, EVENT_STREAM};
use crate::upstream::session::{RelaySession, RelayState};

pub type ByteStream = BoxStream<'static, reqwest::Result<Bytes>>;

/// How an upstream response is relayed to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    Buffered,
    Streaming,
}

impl RelayMode {
    /// Event streams without a declared length are streamed; everything else is buffered.
    pub fn classify(headers: &HeaderMap) -> Self {
        let is_event_stream = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| {
                ct.split(';')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .eq_ignore_ascii_case(EVENT_STREAM)
            })
            .unwrap_or(false);

        if is_event_stream && !headers.contains_key(header::CONTENT_LENGTH) {
            RelayMode::Streaming
        } else {
            RelayMode::Buffered
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelayMode::Buffered => "buffered",
            RelayMode::Streaming => "streaming",
        }
    }
}

/// Status line and headers of an upstream response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// An upstream response after classification.
pub enum UpstreamResponse {
    Buffered { head: ResponseHead, body: Bytes },
    Streaming { head: ResponseHead, body: ByteStream },
}

impl UpstreamResponse {
    /// Classify `response` and, when buffering, read its whole body.
    pub async fn receive(
        response: reqwest::Response,
        request: &OutboundRequest,
        session: &mut RelaySession,
    ) -> Result<Self, ProxyError> {
        session.transition(RelayState::Classifying);
        let head = ResponseHead {
            status: response.status(),
            headers: response.headers().clone(),
        };

        match RelayMode::classify(&head.headers) {
            RelayMode::Streaming => {
                session.transition(RelayState::Streaming);
                Ok(UpstreamResponse::Streaming {
                    head,
                    body: response.bytes_stream().boxed(),
                })
            }
            RelayMode::Buffered => {
                session.transition(RelayState::Buffering);
                let body = session.observe(collect_body(response, request).await)?;
                session.record_chunk(body.len());
                Ok(UpstreamResponse::Buffered { head, body })
            }
        }
    }

    pub fn mode(&self) -> RelayMode {
        match self {
            UpstreamResponse::Buffered { .. } => RelayMode::Buffered,
            UpstreamResponse::Streaming { .. } => RelayMode::Streaming,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            UpstreamResponse::Buffered { head, .. } | UpstreamResponse::Streaming { head, .. } => {
                head.status
            }
        }
    }

    /// Build the caller-facing response. The session ends here (buffered)
    /// or travels with the body (streaming).
    pub fn into_response(self, mut session: RelaySession) -> Response {
        match self {
            UpstreamResponse::Buffered { head, body } => {
                let headers = response_headers(&head.headers, RelayMode::Buffered);
                session.complete();
                build_response(head.status, headers, Body::from(body))
            }
            UpstreamResponse::Streaming { head, body } => {
                let headers = response_headers(&head.headers, RelayMode::Streaming);
                let stream = RelayStream::new(body, session);
                build_response(head.status, headers, Body::from_stream(stream))
            }
        }
    }
}

async fn collect_body(response: reqwest::Response, request: &OutboundRequest) -> Result<Bytes, ProxyError> {
    tokio::select! {
        biased;
        _ = request.cancel.cancelled() => Err(ProxyError::Cancelled),
        result = tokio::time::timeout_at(request.deadline, response.bytes()) => match result {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) if e.is_timeout() => Err(map_send_error(e, request.timeout)),
            Ok(Err(e)) => Err(ProxyError::UpstreamStreamError(error_chain(&e))),
            Err(_) => Err(ProxyError::Timeout(request.timeout.as_millis() as u64)),
        },
    }
}

fn build_response(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Upstream byte stream with session accounting attached.
///
/// Ends early (cleanly) when the session's token is cancelled, which
/// happens on server shutdown.
pub struct RelayStream {
    inner: ByteStream,
    session: RelaySession,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    done: bool,
}

impl RelayStream {
    pub fn new(inner: ByteStream, session: RelaySession) -> Self {
        let cancelled = Box::pin(session.cancel_token().clone().cancelled_owned());
        Self {
            inner,
            session,
            cancelled,
            done: false,
        }
    }

    pub fn session(&self) -> &RelaySession {
        &self.session
    }
}

impl Stream for RelayStream {
    type Item = Result<Bytes, io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        if this.cancelled.poll_unpin(cx).is_ready() {
            this.done = true;
            this.session.fail(&ProxyError::Cancelled);
            return Poll::Ready(None);
        }

        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.session.record_chunk(chunk.len());
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.done = true;
                let err = ProxyError::UpstreamStreamError(error_chain(&e));
                this.session.fail(&err);
                Poll::Ready(Some(Err(io::Error::other(err.to_string()))))
            }
            Poll::Ready(None) => {
                this.done = true;
                this.session.complete();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
