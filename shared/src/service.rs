//! Container service requests and orchestration CLI output parsing

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while decoding a service request
#[derive(Error, Debug)]
pub enum RequestParseError {
    #[error("Malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected a JSON array of items")]
    NotAnArray,

    #[error("Unsupported container action: {0}")]
    UnsupportedAction(String),
}

/// Logical action applied to compose services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Restart,
    Stop,
    /// Pull the image, then recreate the container
    Update,
}

impl FromStr for ServiceAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restart" => Ok(ServiceAction::Restart),
            "stop" => Ok(ServiceAction::Stop),
            "update" => Ok(ServiceAction::Update),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceAction::Restart => "restart",
            ServiceAction::Stop => "stop",
            ServiceAction::Update => "update",
        };
        f.write_str(s)
    }
}

/// Action plus the services it applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceActionRequest {
    /// Parsed action; `None` when missing or not recognized
    pub action: Option<ServiceAction>,
    /// Action text as sent by the client, kept for logging
    pub requested_action: Option<String>,
    /// Selected services, lower-cased, in request order
    pub targets: IndexSet<String>,
}

impl ServiceActionRequest {
    /// Decode the JSON array posted by the frontend
    pub fn from_json(blob: &str) -> Result<Self, RequestParseError> {
        let value: Value = serde_json::from_str(blob)?;
        match value {
            Value::Array(items) => Ok(Self::from_items(&items)),
            _ => Err(RequestParseError::NotAnArray),
        }
    }

    /// Build a request from `{action}` and `{service, selected}` items
    ///
    /// The last `action` item wins. Services whose `selected` marker is
    /// falsy are left out.
    pub fn from_items(items: &[Value]) -> Self {
        let mut requested_action = None;
        for item in items {
            if let Some(action) = item.get("action").filter(|a| !a.is_null()) {
                requested_action = Some(match action {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
            }
        }

        let targets = items
            .iter()
            .filter(|item| item.get("selected").map(is_truthy).unwrap_or(false))
            .filter_map(|item| item.get("service").and_then(Value::as_str))
            .map(str::to_lowercase)
            .collect();

        Self {
            action: requested_action.as_deref().and_then(|a| a.parse().ok()),
            requested_action,
            targets,
        }
    }
}

/// Loose truthiness used by the frontend's `selected` marker
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Actions accepted for direct container control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerAction {
    Start,
    Stop,
    Restart,
    Pause,
    Unpause,
    Kill,
}

impl ContainerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ContainerAction::Start => "start",
            ContainerAction::Stop => "stop",
            ContainerAction::Restart => "restart",
            ContainerAction::Pause => "pause",
            ContainerAction::Unpause => "unpause",
            ContainerAction::Kill => "kill",
        }
    }
}

impl FromStr for ContainerAction {
    type Err = RequestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "start" => Ok(ContainerAction::Start),
            "stop" => Ok(ContainerAction::Stop),
            "restart" => Ok(ContainerAction::Restart),
            "pause" => Ok(ContainerAction::Pause),
            "unpause" => Ok(ContainerAction::Unpause),
            "kill" => Ok(ContainerAction::Kill),
            other => Err(RequestParseError::UnsupportedAction(other.to_string())),
        }
    }
}

impl fmt::Display for ContainerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a direct container control request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomActionRequest {
    #[serde(rename = "selectedServices", default)]
    pub selected_services: Vec<String>,
    #[serde(rename = "select_action", default)]
    pub select_action: String,
}

impl CustomActionRequest {
    pub fn from_json(blob: &str) -> Result<Self, RequestParseError> {
        Ok(serde_json::from_str(blob)?)
    }

    pub fn action(&self) -> Result<ContainerAction, RequestParseError> {
        self.select_action.parse()
    }

    /// Lower-cased service names, empty entries dropped
    pub fn services(&self) -> Vec<String> {
        self.selected_services
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// A container known to the runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// One name per line, blank lines skipped
pub fn parse_service_names(output: &str) -> Vec<ServiceDescriptor> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|name| ServiceDescriptor {
            name: name.to_string(),
            status: None,
        })
        .collect()
}

/// `<name> <status...>` per line, split at the first whitespace
///
/// A name containing whitespace is split wrongly; such names are not
/// produced by compose.
pub fn parse_service_table(output: &str) -> Vec<ServiceDescriptor> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once(char::is_whitespace) {
            Some((name, status)) => ServiceDescriptor {
                name: name.to_string(),
                status: Some(status.trim().to_string()).filter(|s| !s.is_empty()),
            },
            None => ServiceDescriptor {
                name: line.to_string(),
                status: None,
            },
        })
        .collect()
}
