//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware: request ID, trace, panic capture)
//!     → handlers.rs (secret gate, body capture)
//!     → upstream (translate headers, dispatch, relay)
//!     → Send to client
//! ```

pub mod handlers;
pub mod server;

pub use server::{AppState, HttpServer};

/// Correlation header set on every request and echoed on every response.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Present on requests whose caller supplied its own `x-request-id`.
/// Generated ids stay local and are not forwarded upstream.
#[derive(Debug, Clone, Copy)]
pub struct CallerRequestId;
