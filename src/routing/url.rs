//! Full URL assembly around a generated path.

use serde::{Deserialize, Serialize};

use crate::routing::error::RoutingError;

/// How a generated path is turned into a link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlOptions {
    /// Emit only the path (plus root, slash and anchor).
    pub only_path: bool,

    /// Defaults to `http`.
    pub protocol: Option<String>,

    pub host: Option<String>,

    pub port: Option<u16>,

    /// Mount point prepended to every path, e.g. `/blog`.
    pub relative_url_root: Option<String>,

    /// Insert a `/` before the query string (or at the end).
    pub trailing_slash: bool,

    pub anchor: Option<String>,
}

impl UrlOptions {
    pub fn path_only() -> Self {
        Self {
            only_path: true,
            ..Self::default()
        }
    }

    pub fn with_host(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::default()
        }
    }
}

/// Wrap `path` (which may carry a query string) into a URL.
pub fn rewrite_url(path: &str, options: &UrlOptions) -> Result<String, RoutingError> {
    let mut url = String::new();

    if !options.only_path {
        let protocol = options.protocol.as_deref().unwrap_or("http");
        url.push_str(protocol);
        if !protocol.contains("://") {
            url.push_str("://");
        }
        let host = options.host.as_deref().ok_or(RoutingError::MissingHost)?;
        url.push_str(host);
        if let Some(port) = options.port {
            url.push_str(&format!(":{port}"));
        }
    }

    if let Some(root) = options.relative_url_root.as_deref() {
        url.push_str(root.trim_end_matches('/'));
    }

    if options.trailing_slash {
        match path.find('?') {
            Some(at) => {
                url.push_str(&path[..at]);
                url.push('/');
                url.push_str(&path[at..]);
            }
            None => {
                url.push_str(path);
                url.push('/');
            }
        }
    } else {
        url.push_str(path);
    }

    if let Some(anchor) = options.anchor.as_deref() {
        url.push('#');
        url.push_str(anchor);
    }
    Ok(url)
}
