//! Named Render API operations callable without an MCP client.
//!
//! Each entry in [`catalog::CATALOG`] maps a tool name to one REST call; the
//! [`ToolExecutor`] resolves arguments into a request and runs it with the
//! same credential the proxy injects.

pub mod catalog;
pub mod executor;

pub use catalog::{ToolMethod, ToolSpec, CATALOG};
pub use executor::{PreparedCall, ToolExecutor};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool {tool} requires parameter {param}")]
    MissingParameter {
        tool: &'static str,
        param: &'static str,
    },

    #[error("Missing RENDER_API_KEY env var")]
    MissingCredential,

    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Tool call timed out after {0}ms")]
    Timeout(u64),

    #[error("Render API returned {status}: {body}")]
    Upstream { status: u16, body: String },
}
