//! Routing errors as HTTP responses.
//!
//! # Responsibilities
//! - Map recognition failures to status codes
//! - Advertise the verbs that would have matched
//!
//! # Design Decisions
//! - Unknown path → 404, known path with another verb → 405 with `Allow`,
//!   verb outside the supported set → 501
//! - Generation errors surface as 500; they are programming errors in a dispatcher
//! - Bodies are small JSON objects so clients can parse them uniformly

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::routing::error::RoutingError;
use crate::routing::options::HttpMethod;

/// Status code for a routing error.
pub fn status_for(error: &RoutingError) -> StatusCode {
    match error {
        RoutingError::NoRoute { .. } => StatusCode::NOT_FOUND,
        RoutingError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
        RoutingError::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `Allow` header value, e.g. `GET, PUT`.
pub fn allow_header(methods: &[HttpMethod]) -> String {
    methods
        .iter()
        .map(HttpMethod::as_upper)
        .collect::<Vec<_>>()
        .join(", ")
}

impl IntoResponse for RoutingError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let allowed = allow_header(self.allowed_methods());
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        let mut response = (status, body).into_response();
        if !allowed.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&allowed) {
                response.headers_mut().insert(header::ALLOW, value);
            }
        }
        response
    }
}
