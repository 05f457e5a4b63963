//! Configuration schema definitions.
//!
//! This module defines the route file structure: server settings plus the
//! ordered route declarations. All types derive Serde traits for
//! deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::routing::options::RouteValue;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Route table settings.
    pub routing: RoutingConfig,

    /// Route declarations, in priority order.
    pub routes: Vec<RouteEntry>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Full,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Route table settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Controller names `:controller` may match. Empty accepts any single word.
    pub controllers: Vec<String>,

    /// Reload routes when the file changes.
    pub watch: bool,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            controllers: Vec::new(),
            watch: true,
            request_timeout_secs: 30,
        }
    }
}

/// One route declaration. Exactly one of `path`, `resources` or `root` is set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteEntry {
    /// Route path, e.g. `posts/:id(.:format)`.
    pub path: Option<String>,

    /// Declares the RESTful routes for this resource name.
    pub resources: Option<String>,

    /// Declares the `root` route.
    pub root: bool,

    /// Registers a named route.
    pub name: Option<String>,

    pub controller: Option<String>,
    pub action: Option<String>,

    /// Allowed verbs, lower case.
    pub methods: Vec<String>,

    /// Host the request must carry.
    pub host: Option<String>,

    pub requirements: BTreeMap<String, RouteValue>,

    /// Defaults for path keys. An empty string makes the key optional without a value.
    pub defaults: BTreeMap<String, String>,

    /// Fixed parameters. Patterns are treated as requirements.
    pub params: BTreeMap<String, RouteValue>,

    /// Wrap the entry in a namespace of this name.
    pub namespace: Option<String>,
    pub path_prefix: Option<String>,
    pub name_prefix: Option<String>,

    /// Resource action filters.
    pub only: Option<Vec<String>>,
    pub except: Vec<String>,
    pub singular: Option<String>,
}

impl RouteEntry {
    /// Short description for log lines and validation messages.
    pub fn label(&self, index: usize) -> String {
        match (&self.name, &self.path, &self.resources) {
            (Some(name), _, _) => format!("routes[{index}] ({name})"),
            (None, Some(path), _) => format!("routes[{index}] ({path})"),
            (None, None, Some(resources)) => format!("routes[{index}] (resources {resources})"),
            _ => format!("routes[{index}]"),
        }
    }
}
