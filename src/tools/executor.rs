//! Generic executor for catalog tools.

use std::time::Duration;

use reqwest::{header, Client, Method, Url};
use serde_json::{Map, Value};

use crate::config::UpstreamConfig;
use crate::tools::catalog::{self, value_to_string, ToolSpec};
use crate::tools::ToolError;

/// A tool call resolved to a concrete HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCall {
    pub method: Method,
    pub url: Url,
    pub body: Option<Value>,
}

#[derive(Clone)]
pub struct ToolExecutor {
    client: Client,
    base_url: Url,
    api_key: String,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self, ToolError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ToolError::InvalidBaseUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ToolError::InvalidBaseUrl(base_url.to_string()));
        }
        let client = Client::builder()
            .no_proxy()
            .build()
            .map_err(ToolError::Http)?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            timeout,
        })
    }

    /// Executor sharing the proxy's credential and timeout.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, ToolError> {
        let api_key = config.api_key.clone().ok_or(ToolError::MissingCredential)?;
        Self::new(&config.tools_base_url, api_key, config.timeout())
    }

    /// Resolve `name` and `args` without sending anything.
    pub fn prepare(&self, name: &str, args: &Value) -> Result<PreparedCall, ToolError> {
        let tool = catalog::find(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let empty = Map::new();
        let args = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "expected a JSON object, got {}",
                    other
                )))
            }
        };
        tool.check_required(args)?;

        let url = self.tool_url(tool, args)?;
        let mut extra: Map<String, Value> = args
            .iter()
            .filter(|(k, _)| !tool.path_params().any(|p| p == k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if tool.method.has_body() {
            let body = if extra.is_empty() {
                None
            } else {
                Some(Value::Object(extra))
            };
            return Ok(PreparedCall {
                method: tool.method.as_method(),
                url,
                body,
            });
        }

        let mut url = url;
        extra.retain(|_, v| !v.is_null());
        if !extra.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in &extra {
                query.append_pair(key, &value_to_string(value));
            }
        }
        Ok(PreparedCall {
            method: tool.method.as_method(),
            url,
            body: None,
        })
    }

    fn tool_url(&self, tool: &ToolSpec, args: &Map<String, Value>) -> Result<Url, ToolError> {
        let segments = tool.render_segments(args)?;
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ToolError::InvalidBaseUrl(self.base_url.to_string()))?;
            path.pop_if_empty();
            for segment in &segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    /// Run a tool and return the upstream JSON (or the raw text as a JSON string).
    pub async fn call(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let prepared = self.prepare(name, &args)?;
        tracing::debug!(tool = name, method = %prepared.method, url = %prepared.url, "Calling tool");

        let mut request = self
            .client
            .request(prepared.method, prepared.url)
            .bearer_auth(&self.api_key)
            .header(header::ACCEPT, "application/json")
            .timeout(self.timeout);
        if let Some(body) = &prepared.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Timeout(self.timeout.as_millis() as u64)
            } else {
                ToolError::Http(e)
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(ToolError::Http)?;
        if !status.is_success() {
            tracing::warn!(tool = name, status = %status, "Tool call failed");
            return Err(ToolError::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn executor() -> ToolExecutor {
        ToolExecutor::new("https://api.example.com/v1", "key", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn get_arguments_become_query() {
        let call = executor()
            .prepare("list_services", &json!({ "name": "web", "limit": 20 }))
            .unwrap();
        assert_eq!(call.method, Method::GET);
        assert_eq!(call.url.path(), "/v1/services");
        let pairs: Vec<(String, String)> = call.url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("name".into(), "web".into())));
        assert!(pairs.contains(&("limit".into(), "20".into())));
        assert!(call.body.is_none());
    }

    #[test]
    fn path_params_are_encoded_and_removed_from_query() {
        let call = executor()
            .prepare("get_service", &json!({ "serviceId": "srv 1/x" }))
            .unwrap();
        assert_eq!(call.url.path(), "/v1/services/srv%201%2Fx");
        assert!(call.url.query().is_none());
    }

    #[test]
    fn post_arguments_become_body() {
        let call = executor()
            .prepare("trigger_deploy", &json!({ "serviceId": "srv-1", "clearCache": "clear" }))
            .unwrap();
        assert_eq!(call.method, Method::POST);
        assert_eq!(call.url.path(), "/v1/services/srv-1/deploys");
        assert_eq!(call.body, Some(json!({ "clearCache": "clear" })));
    }

    #[test]
    fn post_without_extras_has_no_body() {
        let call = executor()
            .prepare("restart_service", &json!({ "serviceId": "srv-1" }))
            .unwrap();
        assert!(call.body.is_none());
    }

    #[test]
    fn rejects_bad_input() {
        let exec = executor();
        assert!(matches!(
            exec.prepare("nope", &json!({})),
            Err(ToolError::UnknownTool(_))
        ));
        assert!(matches!(
            exec.prepare("get_service", &json!(["srv-1"])),
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            exec.prepare("get_service", &Value::Null),
            Err(ToolError::MissingParameter { .. })
        ));
    }

    #[test]
    fn from_config_uses_loaded_base_url_and_timeout() {
        let env = |key: &str| match key {
            "RENDER_API_KEY" => Some("rnd_abc".to_string()),
            "RENDER_API_BASE" => Some("http://127.0.0.1:7000/base".to_string()),
            "UPSTREAM_TIMEOUT_MS" => Some("1500".to_string()),
            _ => None,
        };
        let config = crate::config::loader::load_config_with(None, env).unwrap();
        let exec = ToolExecutor::from_config(&config.upstream).unwrap();

        assert_eq!(exec.timeout, Duration::from_millis(1500));
        assert_eq!(exec.api_key, "rnd_abc");
        let call = exec
            .prepare("get_service", &json!({ "serviceId": "srv-1" }))
            .unwrap();
        assert_eq!(call.url.as_str(), "http://127.0.0.1:7000/base/services/srv-1");
    }

    #[test]
    fn from_config_requires_key() {
        let config = UpstreamConfig::default();
        assert!(matches!(
            ToolExecutor::from_config(&config),
            Err(ToolError::MissingCredential)
        ));
    }
}
