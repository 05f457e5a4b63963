//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Draw the initial route table
//! - Bind the listener and start the route file watcher
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Config and logging come first and are done by the caller, so errors
//!   from everything after them are logged
//! - Listener starts last (traffic only when routes are drawn)

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::draw::build_route_set;
use crate::config::loader::ConfigError;
use crate::config::schema::AppConfig;
use crate::config::watcher::ConfigWatcher;
use crate::http::server::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_handlers;
use crate::observability::metrics::init_metrics;
use crate::routing::error::BuildError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("routes: {0}")]
    Routes(#[from] BuildError),

    #[error("logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("metrics: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("invalid address {0:?}")]
    Address(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("watcher: {0}")]
    Watcher(#[from] notify::Error),
}

/// A fully initialized server, ready to run.
pub struct Application {
    config: AppConfig,
    server: HttpServer,
    listener: TcpListener,
    path: PathBuf,
    updates_tx: mpsc::UnboundedSender<AppConfig>,
    updates_rx: mpsc::UnboundedReceiver<AppConfig>,
    // Dropping the watcher stops it.
    _watcher: Option<RecommendedWatcher>,
    shutdown: Shutdown,
}

impl Application {
    /// Metrics → routes → listener → watcher, from an already loaded `config`.
    pub async fn build(path: &Path, config: AppConfig) -> Result<Self, StartupError> {
        if config.observability.metrics_enabled {
            let addr: SocketAddr = config
                .observability
                .metrics_address
                .parse()
                .map_err(|_| StartupError::Address(config.observability.metrics_address.clone()))?;
            init_metrics(addr)?;
        }

        let routes = build_route_set(&config)?;
        tracing::info!(
            routes = routes.len(),
            named = routes.named_routes().len(),
            "Routes loaded"
        );
        let server = HttpServer::new(&config, routes);

        let listener = TcpListener::bind(&config.listener.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Listening for connections");

        let (watcher, updates_rx) = ConfigWatcher::new(path);
        let updates_tx = watcher.sender();
        let watcher = if config.routing.watch {
            Some(watcher.run()?)
        } else {
            None
        };

        Ok(Self {
            config,
            server,
            listener,
            path: path.to_path_buf(),
            updates_tx,
            updates_rx,
            _watcher: watcher,
            shutdown: Shutdown::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Triggering the returned handle stops the server.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Configurations sent here replace the route table.
    pub fn reload_sender(&self) -> mpsc::UnboundedSender<AppConfig> {
        self.updates_tx.clone()
    }

    /// Serve until Ctrl+C, SIGTERM or the shutdown handle fires.
    pub async fn run(self) -> Result<(), StartupError> {
        let signals = spawn_signal_handlers(
            self.shutdown.clone(),
            self.path.clone(),
            self.updates_tx.clone(),
        );
        let stopped = self.shutdown.subscribe();

        let result = self
            .server
            .run(self.listener, self.updates_rx, stopped)
            .await;
        signals.abort();
        result?;
        Ok(())
    }
}
