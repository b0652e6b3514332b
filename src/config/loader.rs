//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{LogFormat, ProxyConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, then process environment, then validate.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an injectable environment lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<ProxyConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ProxyConfig::default(),
    };

    apply_env(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto `config`. Empty values count as unset.
pub fn apply_env<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(key) = get("RENDER_API_KEY") {
        config.upstream.api_key = Some(key);
    }
    if let Some(secret) = get("MCP_PATH_SECRET") {
        config.security.path_secret = Some(secret);
    }
    if let Some(url) = get("UPSTREAM_MCP_URL") {
        config.upstream.url = url;
    }
    if let Some(base) = get("RENDER_API_BASE") {
        config.upstream.tools_base_url = base;
    }
    if let Some(raw) = get("UPSTREAM_TIMEOUT_MS") {
        config.upstream.timeout_ms = parse_number("UPSTREAM_TIMEOUT_MS", &raw)?;
    }
    if let Some(raw) = get("PORT") {
        config.listener.port = parse_number("PORT", &raw)?;
    }
    if let Some(raw) = get("MAX_BODY_BYTES") {
        config.listener.max_body_bytes = parse_number("MAX_BODY_BYTES", &raw)?;
    }
    if let Some(raw) = get("LOG_FORMAT") {
        config.observability.log_format = raw
            .parse::<LogFormat>()
            .map_err(|message| ConfigError::Env { var: "LOG_FORMAT", message })?;
    }
    if let Some(addr) = get("METRICS_ADDRESS") {
        config.observability.metrics_address = Some(addr);
    }

    Ok(())
}

fn parse_number<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Env {
        var,
        message: format!("'{}' ({})", raw, e),
    })
}
