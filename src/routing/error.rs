//! Routing error definitions.
//!
//! # Design Decisions
//! - `BuildError` is fatal: a route table with one bad declaration is rejected whole
//! - `RoutingError` is per request (recognition) or per call site (generation)
//! - Generation errors name the unsatisfied keys; they indicate a caller bug

use thiserror::Error;

use crate::routing::options::HttpMethod;

/// Errors raised while compiling route declarations.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A requirement on a path segment was given as a literal.
    #[error("{key}: requirements on a path segment must be regular expressions")]
    NonPatternRequirement { key: String },

    /// User patterns are wrapped in anchors by the builder.
    #[error("Regexp anchor characters are not allowed in routing requirements: {key} => /{pattern}/")]
    AnchoredRequirement { key: String, pattern: String },

    /// Multiline/dot-all flags would let a segment swallow separators.
    #[error("Regexp multiline option not allowed in routing requirements: {key} => /{pattern}/")]
    MultilineRequirement { key: String, pattern: String },

    /// The requirement pattern does not compile.
    #[error("invalid requirement pattern for {key}: {source}")]
    InvalidRequirement {
        key: String,
        #[source]
        source: regex::Error,
    },

    /// A default was supplied for a key that is not part of the path.
    #[error("{key}: No matching segment exists; cannot assign default")]
    DefaultWithoutSegment { key: String },

    /// Every route must produce a controller.
    #[error("Illegal route {path}: the :controller must be specified!")]
    MissingController { path: String },

    /// HEAD is answered by GET routes.
    #[error("HTTP method HEAD is invalid in route conditions; HEAD requests are routed as GET")]
    HeadCondition,

    /// A method condition names an unknown verb.
    #[error("Invalid HTTP method specified in route conditions: {0}")]
    InvalidMethod(String),

    /// The compiled recognition pattern for a route is not a valid regex.
    #[error("route {path} compiles to an invalid pattern: {source}")]
    InvalidPattern {
        path: String,
        #[source]
        source: regex::Error,
    },

    /// `root_as` referenced a route name that has not been declared.
    #[error("no named route '{0}' to copy")]
    UnknownNamedRoute(String),
}

/// Errors raised while recognizing a request or generating a URL.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// Nothing matches the path for any verb.
    #[error("No route matches {path:?} with method {method:?}")]
    NoRoute { path: String, method: Option<String> },

    /// The path exists for other verbs only.
    #[error("Only requests with the following methods are allowed: {}", join_methods(.allowed))]
    MethodNotAllowed { path: String, allowed: Vec<HttpMethod> },

    /// The request verb is outside the supported set.
    #[error("HTTP method {method} is not implemented; allowed: {}", join_methods(.allowed))]
    NotImplemented { method: String, allowed: Vec<HttpMethod> },

    /// No route can produce a URL for the given options.
    #[error("No route matches {options}")]
    NoRouteForOptions { options: String },

    /// Unnamed generation needs both keys to pick candidate routes.
    #[error("Need controller and action!")]
    NeedControllerAndAction,

    /// A named route was asked for options contradicting its requirements.
    #[error("{name}_url failed to generate from {options}, expected: {expected}, diff: {diff}")]
    NamedRouteMismatch {
        name: String,
        options: String,
        expected: String,
        diff: String,
    },

    /// A named route is missing parameters it needs.
    #[error(
        "{name}_url failed to generate from {options} - you may have ambiguous routes, or you may need to supply additional parameters for this route. {name}_url has the following required parameters: {required:?} - are they all satisfied?"
    )]
    NamedRouteMissingParams {
        name: String,
        options: String,
        required: Vec<String>,
    },

    /// Generation referenced an undeclared route name.
    #[error("no route named '{0}'")]
    UnknownNamedRoute(String),

    /// Absolute URLs need a host.
    #[error("Missing host to link to! Please provide the :host parameter")]
    MissingHost,
}

fn join_methods(methods: &[HttpMethod]) -> String {
    methods
        .iter()
        .map(|m| m.as_upper())
        .collect::<Vec<_>>()
        .join(", ")
}

impl RoutingError {
    /// Verbs that would have matched, for the `Allow` header.
    pub fn allowed_methods(&self) -> &[HttpMethod] {
        match self {
            RoutingError::MethodNotAllowed { allowed, .. }
            | RoutingError::NotImplemented { allowed, .. } => allowed,
            _ => &[],
        }
    }
}
