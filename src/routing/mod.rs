//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Declaration (at load):
//!     Mapper / route file entries
//!     → builder.rs (tokenize path, divide and assign options)
//!     → route.rs (compile recognition regex, freeze)
//!     → route_set.rs (ordered list + named routes)
//!
//! Recognition (per request):
//!     path + RequestEnv
//!     → recognition.rs (segment tree picks first possible route)
//!     → route.rs (conditions, regex, parameter extraction)
//!     → Params, or NoRoute / MethodNotAllowed / NotImplemented
//!
//! Generation:
//!     options + recalled params
//!     → route_set.rs (expiry, relative controller, candidate routes)
//!     → route.rs (right-to-left interpolation, query string)
//!     → url.rs (protocol, host, anchor)
//! ```
//!
//! # Design Decisions
//! - Routes compiled at load, immutable afterwards
//! - Deterministic: declaration order decides, first match wins
//! - Recognition and generation are symmetric over the same segments

pub mod builder;
pub mod conditions;
pub mod error;
pub mod mapper;
pub mod named_routes;
pub mod options;
pub mod params;
pub mod recognition;
pub mod regexp;
pub mod route;
pub mod route_set;
pub mod segment;
pub mod url;

pub use builder::RouteBuilder;
pub use conditions::{Condition, RequestEnv};
pub use error::{BuildError, RoutingError};
pub use mapper::{Mapper, ResourceOptions};
pub use options::{HttpMethod, RouteOptions, RouteValue};
pub use params::{ParamValue, Params};
pub use route::Route;
pub use route_set::{LoadState, Recognized, RouteSet};
pub use segment::{ControllerSet, Segment};
pub use url::UrlOptions;
