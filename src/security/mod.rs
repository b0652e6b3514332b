//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request to /mcp/{secret}:
//!     → gate.rs (compare path secret, 401 on mismatch)
//!     → limits.rs (capture body up to the configured limit)
//!     → Pass to upstream dispatch
//! ```
//!
//! # Design Decisions
//! - Fail closed: a configured secret must match exactly
//! - The gate runs before any body is read or any upstream call is made

pub mod gate;
pub mod limits;

pub use gate::{GateDecision, SecretGate};
pub use limits::capture_body;
