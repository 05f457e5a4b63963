//! Route declaration options.
//!
//! `RouteOptions` is what a DSL call or a route file entry hands to the builder:
//! target params, requirements, defaults, conditions and scoping prefixes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::routing::conditions::Condition;
use crate::routing::error::BuildError;

/// Verbs a route condition may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
}

impl HttpMethod {
    /// Every supported verb, in `Allow` header order.
    pub const ALL: [HttpMethod; 6] = [
        HttpMethod::Get,
        HttpMethod::Head,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Head => "head",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
        }
    }

    pub fn as_upper(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| BuildError::InvalidMethod(s.to_string()))
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_upper())
    }
}

/// An option value: a literal string or a pattern the value must match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteValue {
    Literal(String),
    Pattern { pattern: String },
}

impl RouteValue {
    pub fn literal(value: impl Into<String>) -> Self {
        RouteValue::Literal(value.into())
    }

    pub fn pattern(source: impl Into<String>) -> Self {
        RouteValue::Pattern {
            pattern: source.into(),
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, RouteValue::Pattern { .. })
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            RouteValue::Literal(value) => Some(value),
            RouteValue::Pattern { .. } => None,
        }
    }
}

impl fmt::Display for RouteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteValue::Literal(value) => write!(f, "{value:?}"),
            RouteValue::Pattern { pattern } => write!(f, "/{pattern}/"),
        }
    }
}

impl From<&str> for RouteValue {
    fn from(value: &str) -> Self {
        RouteValue::literal(value)
    }
}

impl From<String> for RouteValue {
    fn from(value: String) -> Self {
        RouteValue::Literal(value)
    }
}

/// Request conditions a route adds on top of its path pattern.
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    /// Accepted verbs; empty accepts any.
    pub methods: Vec<HttpMethod>,

    /// Exact host match (case-insensitive).
    pub host: Option<String>,

    /// Application supplied predicates.
    pub custom: Vec<Arc<dyn Condition>>,
}

impl Conditions {
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.host.is_none() && self.custom.is_empty()
    }

    /// Scope conditions overridden by a call's own conditions.
    fn merged_with(&self, overrides: &Conditions) -> Conditions {
        Conditions {
            methods: if overrides.methods.is_empty() {
                self.methods.clone()
            } else {
                overrides.methods.clone()
            },
            host: overrides.host.clone().or_else(|| self.host.clone()),
            custom: self
                .custom
                .iter()
                .chain(overrides.custom.iter())
                .cloned()
                .collect(),
        }
    }
}

/// Options for one route declaration.
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    /// Top-level keys (`controller`, `action`, anything else). Literal values for keys in
    /// the path become defaults; everything else becomes a requirement.
    pub params: BTreeMap<String, RouteValue>,

    /// Explicit requirements.
    pub requirements: BTreeMap<String, RouteValue>,

    /// Explicit defaults. `None` makes the segment optional without a default.
    pub defaults: BTreeMap<String, Option<String>>,

    pub conditions: Conditions,

    pub path_prefix: Option<String>,

    pub name_prefix: Option<String>,

    /// Controller namespace, e.g. `admin/`.
    pub namespace: Option<String>,
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controller(self, controller: impl Into<String>) -> Self {
        self.param("controller", RouteValue::Literal(controller.into()))
    }

    pub fn action(self, action: impl Into<String>) -> Self {
        self.param("action", RouteValue::Literal(action.into()))
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<RouteValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn requirement(mut self, key: impl Into<String>, value: impl Into<RouteValue>) -> Self {
        self.requirements.insert(key.into(), value.into());
        self
    }

    pub fn default_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key.into(), Some(value.into()));
        self
    }

    /// Marks a segment optional without giving it a default.
    pub fn optional(mut self, key: impl Into<String>) -> Self {
        self.defaults.insert(key.into(), None);
        self
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.conditions.methods.push(method);
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.conditions.host = Some(host.into());
        self
    }

    pub fn condition(mut self, condition: Arc<dyn Condition>) -> Self {
        self.conditions.custom.push(condition);
        self
    }

    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = Some(prefix.into());
        self
    }

    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Literal controller given at the top level, if any.
    pub fn controller_name(&self) -> Option<&str> {
        self.params.get("controller").and_then(RouteValue::as_literal)
    }

    /// Applies `overrides` on top of these (scope) options.
    pub fn merged_with(&self, overrides: &RouteOptions) -> RouteOptions {
        let mut merged = self.clone();
        merged.params.extend(overrides.params.clone());
        merged.requirements.extend(overrides.requirements.clone());
        merged.defaults.extend(overrides.defaults.clone());
        merged.conditions = self.conditions.merged_with(&overrides.conditions);
        if overrides.path_prefix.is_some() {
            merged.path_prefix = overrides.path_prefix.clone();
        }
        if overrides.name_prefix.is_some() {
            merged.name_prefix = overrides.name_prefix.clone();
        }
        if overrides.namespace.is_some() {
            merged.namespace = overrides.namespace.clone();
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_is_case_insensitive() {
        assert_eq!("GET".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("delete".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
        assert!(matches!(
            "propfind".parse::<HttpMethod>(),
            Err(BuildError::InvalidMethod(m)) if m == "propfind"
        ));
    }

    #[test]
    fn test_route_value_deserializes_both_forms() {
        #[derive(Deserialize)]
        struct Holder {
            values: BTreeMap<String, RouteValue>,
        }
        let holder: Holder =
            toml::from_str("values = { id = { pattern = '\\d+' }, controller = 'posts' }")
                .unwrap();
        assert_eq!(holder.values["id"], RouteValue::pattern(r"\d+"));
        assert_eq!(holder.values["controller"], RouteValue::literal("posts"));
    }

    #[test]
    fn test_merged_with_prefers_overrides() {
        let scope = RouteOptions::new()
            .controller("posts")
            .path_prefix("admin")
            .method(HttpMethod::Get);
        let call = RouteOptions::new().action("show").method(HttpMethod::Post);
        let merged = scope.merged_with(&call);

        assert_eq!(merged.controller_name(), Some("posts"));
        assert_eq!(merged.params["action"], RouteValue::literal("show"));
        assert_eq!(merged.path_prefix.as_deref(), Some("admin"));
        assert_eq!(merged.conditions.methods, vec![HttpMethod::Post]);
    }
}
