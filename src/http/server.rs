//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the recognition fallback
//! - Wire up middleware (request ID, tracing, timeout)
//! - Bind server to listener
//! - Recognize each request against the live route table
//! - Hand recognized requests to a `Dispatcher`
//! - Hot-swap the route table on config updates

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::draw::build_route_set;
use crate::config::schema::AppConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::observability::metrics;
use crate::routing::conditions::RequestEnv;
use crate::routing::error::BuildError;
use crate::routing::route_set::{Recognized, RouteSet};

/// Receives requests the route table recognized.
pub trait Dispatcher: Send + Sync + 'static {
    fn dispatch(&self, recognized: Recognized, request: &Request<Body>) -> Response;
}

/// Answers with the recognized parameters as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoDispatcher;

impl Dispatcher for EchoDispatcher {
    fn dispatch(&self, recognized: Recognized, _request: &Request<Body>) -> Response {
        Json(recognized).into_response()
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<ArcSwap<RouteSet>>,
    pub dispatcher: Arc<dyn Dispatcher>,
}

/// HTTP server hosting a route table.
pub struct HttpServer {
    router: Router,
    routes: Arc<ArcSwap<RouteSet>>,
}

impl HttpServer {
    /// Create a server answering with [`EchoDispatcher`].
    pub fn new(config: &AppConfig, routes: RouteSet) -> Self {
        Self::with_dispatcher(config, routes, Arc::new(EchoDispatcher))
    }

    pub fn with_dispatcher(
        config: &AppConfig,
        routes: RouteSet,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        metrics::record_route_count(routes.len());
        let routes = Arc::new(ArcSwap::from_pointee(routes));
        let state = AppState {
            routes: Arc::clone(&routes),
            dispatcher,
        };
        let router = Self::build_router(config, state);
        Self { router, routes }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request.request_id().unwrap_or("unknown"),
            )
        });

        Router::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.routing.request_timeout_secs,
            )))
            .layer(propagate_request_id_layer())
            .layer(trace)
            .layer(set_request_id_layer())
    }

    /// Handle to the live route table.
    pub fn routes(&self) -> Arc<ArcSwap<RouteSet>> {
        Arc::clone(&self.routes)
    }

    /// Serve until `shutdown` fires, swapping in route tables from `updates`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut updates: mpsc::UnboundedReceiver<AppConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let routes = Arc::clone(&self.routes);
        let reloader = tokio::spawn(async move {
            while let Some(config) = updates.recv().await {
                let _ = swap_routes(&routes, &config);
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build a table from `config` and publish it. On failure the current table stays.
pub fn swap_routes(routes: &ArcSwap<RouteSet>, config: &AppConfig) -> Result<usize, BuildError> {
    match build_route_set(config) {
        Ok(set) => {
            let count = set.len();
            routes.store(Arc::new(set));
            metrics::record_reload("applied");
            metrics::record_route_count(count);
            tracing::info!(routes = count, "Route table swapped");
            Ok(count)
        }
        Err(e) => {
            metrics::record_reload("failed");
            tracing::error!(error = %e, "Route reload failed. Keeping current table.");
            Err(e)
        }
    }
}

/// Recognizes the request and dispatches it.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let env = RequestEnv::from_request(&request);
    let path = request.uri().path().to_string();

    let result = state.routes.load().recognize(&path, &env);
    metrics::record_recognition(metrics::outcome_label(&result), started);

    match result {
        Ok(recognized) => {
            tracing::debug!(
                path = %path,
                controller = %recognized.controller,
                action = %recognized.action,
                route = recognized.route_index,
                "Dispatching"
            );
            state.dispatcher.dispatch(recognized, &request)
        }
        Err(e) => {
            tracing::info!(path = %path, error = %e, "Recognition failed");
            e.into_response()
        }
    }
}
