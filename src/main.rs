//! Render MCP Proxy
//!
//! Relays MCP requests to a single upstream, injecting the Render API key.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                 MCP PROXY                    │
//!     Client Request      │  ┌──────────┐   ┌──────────┐   ┌──────────┐  │
//!     ────────────────────┼─▶│  secret  │──▶│  header  │──▶│ upstream │──┼──▶ Upstream
//!                         │  │   gate   │   │translator│   │dispatcher│  │    (MCP/SSE)
//!                         │  └──────────┘   └──────────┘   └────┬─────┘  │
//!                         │                                     │        │
//!     Client Response     │                 ┌──────────┐        │        │
//!     ◀───────────────────┼─────────────────│ response │◀───────┘        │
//!                         │  buffered or    │  relay   │                 │
//!                         │  streamed       └──────────┘                 │
//!                         └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use render_mcp_proxy::config::load_config;
use render_mcp_proxy::lifecycle::{signals, Shutdown};
use render_mcp_proxy::observability::{logging, metrics};
use render_mcp_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "render-mcp-proxy")]
#[command(about = "Reverse proxy relaying MCP traffic to Render", long_about = None)]
struct Cli {
    /// Optional TOML config file; environment variables override it.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Listen port (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.listener.port = port;
    }

    logging::init(&config.observability)?;
    logging::install_panic_hook();

    tracing::info!("render-mcp-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        port = config.listener.port,
        upstream = %config.upstream.url,
        timeout_ms = config.upstream.timeout_ms,
        max_body_bytes = config.listener.max_body_bytes,
        api_key_configured = config.upstream.api_key.is_some(),
        gate_open = config.security.path_secret.is_none(),
        "Configuration loaded"
    );
    if config.upstream.api_key.is_none() {
        tracing::warn!("RENDER_API_KEY is not set; relayed requests will fail with 500");
    }

    if let Some(addr) = &config.observability.metrics_address {
        match addr.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => {
                tracing::error!(metrics_address = %addr, "Failed to parse metrics address");
            }
        }
    }

    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::trigger_on_signal(shutdown.clone()));

    let server = HttpServer::new(config, shutdown.subscribe())?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
