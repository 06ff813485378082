//! Main runtime orchestration.
//!
//! The runtime owns the configured listen address and mounts both transport
//! faces on one axum application: the WebSocket RPC endpoint at `/` and the
//! HTTP dispatch middleware over everything else, with a plain 404 fallback
//! for paths neither transport claims.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use junction_framework::Dispatcher;
//! use junction_runtime::JunctionRuntime;
//!
//! #[tokio::main]
//! async fn main() -> junction_runtime::RuntimeResult<()> {
//!     let mut dispatcher = Dispatcher::new();
//!     dispatcher.register("/status", status_handler)?;
//!
//!     // Auto-loads junction.yaml from the current directory
//!     let runtime = JunctionRuntime::new(dispatcher);
//!
//!     // Serves ws://127.0.0.1:1732 until Ctrl+C
//!     runtime.run().await
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use axum::{Json, Router, http::StatusCode};
use serde_json::json;
use tokio::signal;
use tracing::{info, warn};

use junction_framework::Dispatcher;
use junction_transport::{RpcServer, http};

use crate::config::{ConfigLoader, JunctionConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// The junction daemon runtime.
pub struct JunctionRuntime {
    config: JunctionConfig,
    server: RpcServer,
}

impl JunctionRuntime {
    /// Creates a runtime with automatic configuration loading.
    ///
    /// Searches the current directory and the user config directory for
    /// `junction.yaml`; falls back to defaults when none is found.
    pub fn new(dispatcher: Dispatcher) -> Self {
        let config = ConfigLoader::default().load().unwrap_or_else(|err| {
            eprintln!("Warning: failed to load config ({err}), using defaults");
            JunctionConfig::default()
        });
        Self::from_config(&config, dispatcher)
    }

    /// Creates a runtime from an explicit configuration.
    ///
    /// Initializes logging from the configuration; a subscriber installed
    /// earlier (e.g. by tests) is left in place.
    pub fn from_config(config: &JunctionConfig, dispatcher: Dispatcher) -> Self {
        logging::init_from_config(&config.logging);

        let server = RpcServer::new(Arc::new(dispatcher));
        info!(
            addr = %config.server.bind_addr(),
            log_level = %config.logging.level,
            "runtime initialized"
        );

        Self {
            config: config.clone(),
            server,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &JunctionConfig {
        &self.config
    }

    /// The dispatcher requests are routed through.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        self.server.dispatcher()
    }

    /// Builds the axum application serving both transport faces.
    pub fn router(&self) -> Router {
        let app = self.server.router().fallback(not_found);
        http::attach(app, Arc::clone(self.server.dispatcher()))
    }

    /// Runs the daemon until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs the daemon until the given future resolves.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.server.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| RuntimeError::Bind {
                addr: addr.clone(),
                source,
            })?;

        info!(addr = %addr, "daemon listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("daemon stopped");
        Ok(())
    }
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not Found" })))
}

/// Completes when the process is asked to stop: Ctrl+C anywhere, SIGTERM
/// on unix.
async fn wait_for_shutdown() {
    tokio::select! {
        _ = signal::ctrl_c() => info!("received Ctrl+C, shutting down"),
        _ = sigterm() => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(unix)]
async fn sigterm() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(err) => {
            warn!(error = %err, "SIGTERM handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use junction_core::Context;
    use junction_framework::Next;

    fn status_dispatcher() -> Dispatcher {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .register("/status", |ctx: Arc<Context>, _next: Next| async move {
                ctx.response().send(json!({ "ok": true }));
                Ok(())
            })
            .unwrap();
        dispatcher
    }

    fn free_port() -> u16 {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn run_until_serves_and_stops() {
        let config = JunctionConfig {
            server: crate::config::ServerConfig {
                host: "127.0.0.1".into(),
                port: free_port(),
            },
            ..Default::default()
        };
        let runtime = JunctionRuntime::from_config(&config, status_dispatcher());

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            runtime
                .run_until(async {
                    let _ = stop_rx.await;
                })
                .await
        });

        // let the listener come up, then stop it
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        stop_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bind_failure_surfaces_the_address() {
        // occupy a port so the runtime cannot take it
        let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = occupied.local_addr().unwrap().port();

        let config = JunctionConfig {
            server: crate::config::ServerConfig {
                host: "127.0.0.1".into(),
                port,
            },
            ..Default::default()
        };
        let runtime = JunctionRuntime::from_config(&config, Dispatcher::new());
        let err = runtime.run_until(async {}).await.unwrap_err();
        match err {
            RuntimeError::Bind { addr, .. } => assert_eq!(addr, format!("127.0.0.1:{port}")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
