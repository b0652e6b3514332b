//! Render MCP Proxy Library
//!
//! A single-upstream reverse proxy that relays MCP traffic to Render,
//! injecting the API key and passing event streams through unbuffered.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod tools;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
