//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID assigned and propagated)
//!     → RouteSet::recognize (live snapshot)
//!     → Dispatcher (recognized params) or response.rs (404 / 405 / 501)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{Dispatcher, EchoDispatcher, HttpServer};
