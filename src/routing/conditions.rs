//! Request condition matching.
//!
//! # Responsibilities
//! - Match the request verb against a route's method condition
//! - Match the host (exact match, case-insensitive)
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Conditions see a `RequestEnv`, not the HTTP request, so recognition stays
//!   usable outside the server
//! - Empty condition = always matches (wildcard)
//! - HEAD requests are recognized as GET

use std::fmt;
use std::sync::Arc;

use axum::http::{header, Request};

use crate::routing::options::{Conditions, HttpMethod};

/// The slice of a request that recognition looks at besides the path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestEnv {
    /// Lower-case verb. May name a verb outside [`HttpMethod::ALL`].
    pub method: Option<String>,

    /// Lower-case host without port.
    pub host: Option<String>,
}

impl RequestEnv {
    pub fn new(method: HttpMethod) -> Self {
        Self::with_method(method.as_str())
    }

    /// Environment for an arbitrary verb string.
    pub fn with_method(method: impl AsRef<str>) -> Self {
        Self {
            method: Some(normalize_method(method.as_ref())),
            host: None,
        }
    }

    pub fn host(mut self, host: impl AsRef<str>) -> Self {
        self.host = Some(normalize_host(host.as_ref()));
        self
    }

    /// Extract the environment from an HTTP request.
    pub fn from_request<B>(req: &Request<B>) -> Self {
        let method = normalize_method(req.method().as_str());
        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| req.uri().host())
            .map(normalize_host);
        Self {
            method: Some(method),
            host,
        }
    }

    /// The verb, if it is one routes can be conditioned on.
    pub fn known_method(&self) -> Option<HttpMethod> {
        self.method.as_deref().and_then(|m| m.parse().ok())
    }

    /// Same environment with a different verb.
    pub fn for_method(&self, method: HttpMethod) -> Self {
        Self {
            method: Some(method.as_str().to_string()),
            host: self.host.clone(),
        }
    }
}

fn normalize_method(method: &str) -> String {
    let method = method.to_ascii_lowercase();
    if method == "head" {
        "get".to_string()
    } else {
        method
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.rsplit_once(':').map_or(host, |(name, port)| {
        if port.chars().all(|c| c.is_ascii_digit()) {
            name
        } else {
            host
        }
    });
    host.to_lowercase()
}

/// Trait for matching requests against conditions.
pub trait Condition: Send + Sync + fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, env: &RequestEnv) -> bool;
}

/// Matches the request verb.
#[derive(Debug, Clone)]
pub struct MethodCondition {
    methods: Vec<HttpMethod>,
}

impl MethodCondition {
    pub fn new(methods: Vec<HttpMethod>) -> Self {
        Self { methods }
    }
}

impl Condition for MethodCondition {
    fn matches(&self, env: &RequestEnv) -> bool {
        env.method
            .as_deref()
            .is_some_and(|m| self.methods.iter().any(|allowed| allowed.as_str() == m))
    }
}

/// Matches the Host header.
#[derive(Debug, Clone)]
pub struct HostCondition {
    expected_host: String,
}

impl HostCondition {
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl AsRef<str>) -> Self {
        Self {
            expected_host: normalize_host(host.as_ref()),
        }
    }
}

impl Condition for HostCondition {
    fn matches(&self, env: &RequestEnv) -> bool {
        env.host.as_deref() == Some(self.expected_host.as_str())
    }
}

/// Combines multiple conditions with AND semantics.
#[derive(Debug, Clone, Default)]
pub struct AllConditions {
    conditions: Vec<Arc<dyn Condition>>,
}

impl AllConditions {
    pub fn new(conditions: Vec<Arc<dyn Condition>>) -> Self {
        Self { conditions }
    }

    /// Compile declared conditions, cheapest first.
    pub fn compile(conditions: &Conditions) -> Self {
        let mut compiled: Vec<Arc<dyn Condition>> = Vec::new();
        if !conditions.methods.is_empty() {
            compiled.push(Arc::new(MethodCondition::new(conditions.methods.clone())));
        }
        if let Some(host) = &conditions.host {
            compiled.push(Arc::new(HostCondition::new(host)));
        }
        compiled.extend(conditions.custom.iter().cloned());
        Self::new(compiled)
    }
}

impl Condition for AllConditions {
    fn matches(&self, env: &RequestEnv) -> bool {
        self.conditions.iter().all(|c| c.matches(env))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Method;

    #[test]
    fn test_host_condition() {
        let condition = HostCondition::new("example.com");

        assert!(condition.matches(&RequestEnv::new(HttpMethod::Get).host("example.com")));
        // Case insensitive, port ignored
        assert!(condition.matches(&RequestEnv::new(HttpMethod::Get).host("EXAMPLE.COM:8080")));
        assert!(!condition.matches(&RequestEnv::new(HttpMethod::Get).host("other.com")));
        assert!(!condition.matches(&RequestEnv::new(HttpMethod::Get)));
    }

    #[test]
    fn test_method_condition() {
        let condition = MethodCondition::new(vec![HttpMethod::Get, HttpMethod::Post]);

        assert!(condition.matches(&RequestEnv::new(HttpMethod::Post)));
        assert!(!condition.matches(&RequestEnv::new(HttpMethod::Delete)));
        assert!(!condition.matches(&RequestEnv::default()));
    }

    #[test]
    fn test_all_conditions_empty_matches_everything() {
        let all = AllConditions::compile(&Conditions::default());
        assert!(all.matches(&RequestEnv::default()));
    }

    #[test]
    fn test_env_from_request_treats_head_as_get() {
        let req = Request::builder()
            .method(Method::HEAD)
            .uri("/posts")
            .header("Host", "Example.com:3000")
            .body(Body::default())
            .unwrap();
        let env = RequestEnv::from_request(&req);

        assert_eq!(env.method.as_deref(), Some("get"));
        assert_eq!(env.host.as_deref(), Some("example.com"));
        assert_eq!(env.known_method(), Some(HttpMethod::Get));
    }

    #[test]
    fn test_env_constructors_treat_head_as_get() {
        let get_only = MethodCondition::new(vec![HttpMethod::Get]);

        assert_eq!(RequestEnv::new(HttpMethod::Head).method.as_deref(), Some("get"));
        assert_eq!(RequestEnv::with_method("HEAD").known_method(), Some(HttpMethod::Get));
        assert!(get_only.matches(&RequestEnv::new(HttpMethod::Head)));
    }

    #[test]
    fn test_env_keeps_unknown_verbs() {
        let env = RequestEnv::with_method("PROPFIND");
        assert_eq!(env.method.as_deref(), Some("propfind"));
        assert_eq!(env.known_method(), None);
    }
}
