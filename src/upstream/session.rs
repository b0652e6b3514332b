//! Relay session state machine and lifetime tracking.
//!
//! # States
//! ```text
//! Idle → Dispatched → Classifying → {Buffering | Streaming} → Completed | Failed
//! ```
//!
//! A session lives exactly as long as one inbound exchange. It is moved
//! into the response body when streaming, so dropping the body (caller
//! went away) drops the session. A session dropped before reaching a
//! terminal state is a client disconnect: its cancellation token fires
//! and the upstream leg is released.

use std::time::Instant;

use axum::http::Method;
use tokio_util::sync::CancellationToken;

use crate::error::ProxyError;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Dispatched,
    Classifying,
    Buffering,
    Streaming,
    Completed,
    Failed,
}

impl RelayState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RelayState::Completed | RelayState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelayState::Idle => "idle",
            RelayState::Dispatched => "dispatched",
            RelayState::Classifying => "classifying",
            RelayState::Buffering => "buffering",
            RelayState::Streaming => "streaming",
            RelayState::Completed => "completed",
            RelayState::Failed => "failed",
        }
    }
}

/// One inbound exchange paired with its upstream call.
#[derive(Debug)]
pub struct RelaySession {
    request_id: String,
    method: Method,
    started: Instant,
    state: RelayState,
    bytes: u64,
    chunks: u64,
    cancel: CancellationToken,
}

impl RelaySession {
    /// `cancel` is usually a child of the server shutdown token.
    pub fn new(request_id: impl Into<String>, method: Method, cancel: CancellationToken) -> Self {
        Self {
            request_id: request_id.into(),
            method,
            started: Instant::now(),
            state: RelayState::Idle,
            bytes: 0,
            chunks: 0,
            cancel,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    /// Move to a non-terminal state. Terminal sessions are left untouched.
    pub fn transition(&mut self, next: RelayState) {
        if self.state.is_terminal() {
            return;
        }
        tracing::trace!(
            request_id = %self.request_id,
            from = self.state.as_str(),
            to = next.as_str(),
            "Relay state change"
        );
        self.state = next;
    }

    pub fn record_chunk(&mut self, len: usize) {
        self.bytes += len as u64;
        self.chunks += 1;
    }

    pub fn complete(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        let mode = self.state.as_str();
        self.state = RelayState::Completed;
        metrics::record_relay_bytes(mode, self.bytes);
        tracing::debug!(
            request_id = %self.request_id,
            mode,
            bytes = self.bytes,
            chunks = self.chunks,
            elapsed_ms = self.elapsed_ms() as u64,
            "Relay completed"
        );
    }

    pub fn fail(&mut self, error: &ProxyError) {
        if self.state.is_terminal() {
            return;
        }
        let stage = self.state.as_str();
        self.state = RelayState::Failed;
        metrics::record_upstream_error(error.kind());
        tracing::warn!(
            request_id = %self.request_id,
            stage,
            bytes = self.bytes,
            error = %error,
            "Relay failed"
        );
    }

    /// Mark the session failed when `result` is an error, then pass it on.
    pub fn observe<T>(&mut self, result: Result<T, ProxyError>) -> Result<T, ProxyError> {
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.cancel.cancel();
        metrics::record_client_disconnect();
        tracing::info!(
            request_id = %self.request_id,
            stage = self.state.as_str(),
            bytes = self.bytes,
            chunks = self.chunks,
            "Client disconnected, upstream released"
        );
    }
}
