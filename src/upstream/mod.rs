//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! inbound headers
//!     → headers.rs (drop connection headers, inject bearer, default Accept)
//!     → dispatcher.rs (send with deadline + cancellation)
//!     → relay.rs (classify, buffer or stream back to the caller)
//!
//! session.rs tracks one exchange across all three steps.
//! ```

pub mod dispatcher;
pub mod headers;
pub mod relay;
pub mod session;

pub use dispatcher::{Dispatcher, OutboundRequest};
pub use headers::translate_headers;
pub use relay::{RelayMode, RelayStream, UpstreamResponse};
pub use session::{RelaySession, RelayState};
