use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use render_mcp_proxy::config::load_config;
use render_mcp_proxy::tools::{ToolError, ToolExecutor, CATALOG};

/// Credentials and endpoints come from the same config file and environment
/// as the proxy (`RENDER_API_KEY`, `RENDER_API_BASE`, `UPSTREAM_TIMEOUT_MS`).
#[derive(Parser)]
#[command(name = "render-tools")]
#[command(about = "Call Render API tools directly", long_about = None)]
struct Cli {
    /// Optional TOML config file; environment variables override it.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the API base URL.
    #[arg(short, long)]
    base_url: Option<String>,

    /// Override the call timeout.
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available tools
    List,
    /// Call one tool
    Call {
        name: String,
        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            for tool in CATALOG {
                println!("{:<16} {:<6} {}", tool.name, tool.method.as_method().as_str(), tool.path);
                println!("{:<16} {}", "", tool.description);
            }
        }
        Commands::Call { name, args } => {
            let args: Value = serde_json::from_str(&args)
                .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

            let mut config = load_config(cli.config.as_deref())?;
            if let Some(base_url) = cli.base_url {
                config.upstream.tools_base_url = base_url;
            }
            if let Some(timeout_ms) = cli.timeout_ms {
                config.upstream.timeout_ms = timeout_ms;
            }
            let executor = ToolExecutor::from_config(&config.upstream)?;

            match executor.call(&name, args).await {
                Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                Err(ToolError::Upstream { status, body }) => {
                    eprintln!("Error: Render API returned status {}", status);
                    eprintln!("Response: {}", body);
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
