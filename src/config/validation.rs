//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, log levels and timeouts
//! - Check each route entry declares exactly one kind of route
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Route patterns are checked by the route builder, not here

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{AppConfig, RouteEntry};
use crate::routing::options::HttpMethod;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address {:?}", config.listener.bind_address),
        ));
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {:?}", observability.log_level),
        ));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {:?}", observability.metrics_address),
        ));
    }

    if config.routing.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "routing.request_timeout_secs",
            "must be greater than zero",
        ));
    }

    for (index, entry) in config.routes.iter().enumerate() {
        validate_route(index, entry, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(index: usize, entry: &RouteEntry, errors: &mut Vec<ValidationError>) {
    let label = entry.label(index);

    let kinds = [entry.path.is_some(), entry.resources.is_some(), entry.root]
        .into_iter()
        .filter(|set| *set)
        .count();
    if kinds != 1 {
        errors.push(ValidationError::new(
            label.clone(),
            "exactly one of path, resources or root is required",
        ));
    }

    for method in &entry.methods {
        if method.parse::<HttpMethod>().is_err() {
            errors.push(ValidationError::new(
                label.clone(),
                format!("unknown method {method:?}"),
            ));
        }
    }

    if entry.resources.is_none()
        && (entry.only.is_some() || !entry.except.is_empty() || entry.singular.is_some())
    {
        errors.push(ValidationError::new(
            label,
            "only, except and singular apply to resources",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str) -> RouteEntry {
        RouteEntry {
            path: Some(path.to_string()),
            ..RouteEntry::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_route_kind_must_be_unique() {
        let mut config = AppConfig::default();
        config.routes.push(RouteEntry {
            root: true,
            ..entry("posts")
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "routes[0] (posts)");
    }

    #[test]
    fn test_unknown_method_and_level() {
        let mut config = AppConfig::default();
        config.observability.log_level = "loud".into();
        config.routes.push(RouteEntry {
            methods: vec!["get".into(), "fetch".into()],
            ..entry("posts")
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.message.contains("fetch")));
    }

    #[test]
    fn test_resource_filters_need_resources() {
        let mut config = AppConfig::default();
        config.routes.push(RouteEntry {
            except: vec!["destroy".into()],
            ..entry("posts")
        });
        assert!(validate_config(&config).is_err());

        config.routes[0].path = None;
        config.routes[0].resources = Some("posts".into());
        assert!(validate_config(&config).is_ok());
    }
}
