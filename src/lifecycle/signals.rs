//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//! - Trigger appropriate actions (shutdown, reload)
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers route reload, not shutdown
//! - A route file that fails to load on SIGHUP is logged and ignored

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::loader::load_config;
use crate::config::schema::AppConfig;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics::record_reload;

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

/// Load the route file and queue it for the server. Returns whether it was queued.
pub fn reload_from(path: &Path, updates: &mpsc::UnboundedSender<AppConfig>) -> bool {
    match load_config(path) {
        Ok(config) => updates.send(config).is_ok(),
        Err(e) => {
            tracing::error!(path = ?path, error = %e, "Reload rejected. Keeping current table.");
            record_reload("invalid");
            false
        }
    }
}

/// Spawn the signal loop: shutdown on Ctrl+C/SIGTERM, reload `path` on SIGHUP.
pub fn spawn_signal_handlers(
    shutdown: Shutdown,
    path: PathBuf,
    updates: mpsc::UnboundedSender<AppConfig>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::hangup()) {
                Ok(mut hangup) => {
                    let stop = shutdown_signal();
                    tokio::pin!(stop);
                    loop {
                        tokio::select! {
                            _ = &mut stop => break,
                            Some(()) = hangup.recv() => {
                                tracing::info!(path = ?path, "SIGHUP received, reloading routes");
                                reload_from(&path, &updates);
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "SIGHUP reload unavailable");
                    shutdown_signal().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = (&path, &updates);
            shutdown_signal().await;
        }
        shutdown.trigger();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_reload_from_queues_valid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[routes]]\npath = \"posts\"\ncontroller = \"posts\"").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(reload_from(file.path(), &tx));
        assert_eq!(rx.try_recv().unwrap().routes.len(), 1);
    }

    #[test]
    fn test_reload_from_rejects_invalid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[routes]]\ncontroller = \"posts\"").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(!reload_from(file.path(), &tx));
        assert!(rx.try_recv().is_err());
    }
}
