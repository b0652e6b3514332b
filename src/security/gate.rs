//! Shared-secret path gate.
//!
//! The secret travels as a path segment (`/mcp/{secret}`); it is compared
//! by exact string equality. With no secret configured the gate is open.

use crate::error::ProxyError;

/// Outcome of a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Authorized,
    Unauthorized,
}

/// Compares caller tokens against the configured secret.
#[derive(Clone, Default)]
pub struct SecretGate {
    secret: Option<String>,
}

impl SecretGate {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    /// True when no secret is configured.
    pub fn is_open(&self) -> bool {
        self.secret.is_none()
    }

    pub fn check(&self, token: &str) -> GateDecision {
        match &self.secret {
            None => GateDecision::Authorized,
            Some(secret) if secret == token => GateDecision::Authorized,
            Some(_) => GateDecision::Unauthorized,
        }
    }

    /// [`check`](Self::check) mapped onto the request error type.
    pub fn authorize(&self, token: &str) -> Result<(), ProxyError> {
        match self.check(token) {
            GateDecision::Authorized => Ok(()),
            GateDecision::Unauthorized => Err(ProxyError::Unauthorized),
        }
    }
}

impl std::fmt::Debug for SecretGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretGate")
            .field("open", &self.is_open())
            .finish()
    }
}
