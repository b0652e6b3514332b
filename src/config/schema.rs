//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::Deserialize;
use std::time::Duration;

/// Default upstream MCP endpoint.
pub const DEFAULT_UPSTREAM_URL: &str = "https://mcp.render.com/mcp";

/// Default base URL for the named tool layer.
pub const DEFAULT_TOOLS_BASE_URL: &str = "https://api.render.com/v1";

/// Default outbound deadline in milliseconds.
pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 120_000;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (port, body limit).
    pub listener: ListenerConfig,

    /// The single upstream target and its credential.
    pub upstream: UpstreamConfig,

    /// Path secret gate.
    pub security: SecurityConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Inbound listen port.
    pub port: u16,

    /// Largest inbound request body captured for forwarding.
    pub max_body_bytes: usize,
}

impl ListenerConfig {
    /// Socket address string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10_000,
            max_body_bytes: 4 * 1024 * 1024, // 4MB
        }
    }
}

/// Upstream target configuration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Fixed upstream URL every relayed request is sent to.
    pub url: String,

    /// Bearer credential injected on every outbound call.
    pub api_key: Option<String>,

    /// Deadline for the outbound call in milliseconds.
    pub timeout_ms: u64,

    /// Base URL used by the named tool executor.
    pub tools_base_url: String,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_UPSTREAM_URL.to_string(),
            api_key: None,
            timeout_ms: DEFAULT_UPSTREAM_TIMEOUT_MS,
            tools_base_url: DEFAULT_TOOLS_BASE_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_ms", &self.timeout_ms)
            .field("tools_base_url", &self.tools_base_url)
            .finish()
    }
}

/// Path secret configuration.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Shared secret expected in the request path. `None` leaves the gate open.
    pub path_secret: Option<String>,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("path_secret", &self.path_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Fallback tracing filter when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Prometheus exporter address. Metrics are not exported when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "render_mcp_proxy=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_address: None,
        }
    }
}
