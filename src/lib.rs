//! railyard: route compiling and URL recognition.
//!
//! Routes are declared through [`routing::Mapper`] or a TOML route file,
//! compiled once into immutable [`routing::Route`]s and collected in a
//! [`routing::RouteSet`] that recognizes request paths and generates URLs.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::RouteSet;
