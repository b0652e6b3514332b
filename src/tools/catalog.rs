//! Static catalog of named tools.
//!
//! Each tool maps to one REST call: an HTTP method, a path template with
//! `{param}` placeholders, and the arguments that must be present.

use serde_json::{Map, Value};

use crate::tools::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMethod {
    Get,
    Post,
    Delete,
}

impl ToolMethod {
    pub fn as_method(self) -> reqwest::Method {
        match self {
            ToolMethod::Get => reqwest::Method::GET,
            ToolMethod::Post => reqwest::Method::POST,
            ToolMethod::Delete => reqwest::Method::DELETE,
        }
    }

    /// Whether leftover arguments travel as a JSON body rather than a query string.
    pub fn has_body(self) -> bool {
        matches!(self, ToolMethod::Post)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub method: ToolMethod,
    pub path: &'static str,
    pub required: &'static [&'static str],
}

pub static CATALOG: &[ToolSpec] = &[
    ToolSpec {
        name: "list_services",
        description: "List services in the account (optional: name, type, limit, cursor)",
        method: ToolMethod::Get,
        path: "/services",
        required: &[],
    },
    ToolSpec {
        name: "get_service",
        description: "Fetch one service by id",
        method: ToolMethod::Get,
        path: "/services/{serviceId}",
        required: &["serviceId"],
    },
    ToolSpec {
        name: "list_deploys",
        description: "List deploys of a service (optional: limit, cursor)",
        method: ToolMethod::Get,
        path: "/services/{serviceId}/deploys",
        required: &["serviceId"],
    },
    ToolSpec {
        name: "get_deploy",
        description: "Fetch one deploy of a service",
        method: ToolMethod::Get,
        path: "/services/{serviceId}/deploys/{deployId}",
        required: &["serviceId", "deployId"],
    },
    ToolSpec {
        name: "trigger_deploy",
        description: "Start a new deploy (optional: clearCache, commitId)",
        method: ToolMethod::Post,
        path: "/services/{serviceId}/deploys",
        required: &["serviceId"],
    },
    ToolSpec {
        name: "restart_service",
        description: "Restart a running service",
        method: ToolMethod::Post,
        path: "/services/{serviceId}/restart",
        required: &["serviceId"],
    },
    ToolSpec {
        name: "list_env_vars",
        description: "List environment variables of a service",
        method: ToolMethod::Get,
        path: "/services/{serviceId}/env-vars",
        required: &["serviceId"],
    },
];

pub fn find(name: &str) -> Option<&'static ToolSpec> {
    CATALOG.iter().find(|tool| tool.name == name)
}

impl ToolSpec {
    /// Placeholder names in the path template, in order.
    pub fn path_params(&self) -> impl Iterator<Item = &'static str> {
        self.path
            .split('/')
            .filter_map(|seg| seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
    }

    /// Fail with the first required argument that is absent or null.
    pub fn check_required(&self, args: &Map<String, Value>) -> Result<(), ToolError> {
        for param in self.required.iter().copied() {
            match args.get(param) {
                None | Some(Value::Null) => {
                    return Err(ToolError::MissingParameter {
                        tool: self.name,
                        param,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Path segments with placeholders substituted. Segments are unencoded.
    pub fn render_segments(&self, args: &Map<String, Value>) -> Result<Vec<String>, ToolError> {
        self.path
            .split('/')
            .filter(|seg| !seg.is_empty())
            .map(|seg| match seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(param) => args
                    .get(param)
                    .filter(|v| !v.is_null())
                    .map(value_to_string)
                    .ok_or(ToolError::MissingParameter {
                        tool: self.name,
                        param,
                    }),
                None => Ok(seg.to_string()),
            })
            .collect()
    }
}

/// Strings as-is, everything else as compact JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
