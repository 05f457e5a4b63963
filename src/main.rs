//! railyard server.
//!
//! Loads a route file, draws the route table and serves it over HTTP.
//! Recognized requests are answered by the echo dispatcher with the
//! recognized controller, action and parameters.
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ RouteSet::recognize ──▶ Dispatcher
//!                          │                  ▲
//!                          ▼                  │ ArcSwap
//!                     404/405/501        route file watcher / SIGHUP
//! ```

use std::path::PathBuf;

use clap::Parser;

use railyard::config::load_config;
use railyard::lifecycle::Application;
use railyard::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "railyard")]
#[command(about = "Serve a compiled route table", long_about = None)]
struct Cli {
    /// Route file (TOML).
    #[arg(short, long, default_value = "routes.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        "railyard starting"
    );

    let app = Application::build(&cli.config, config).await?;
    app.run().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
