//! HTTP control surface
//!
//! This module handles:
//! - Routing requests to the device components
//! - Mapping component outcomes onto status codes
//! - Running the listener with graceful shutdown

mod context;
mod error;
mod routes;

pub use context::AppContext;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Build the router over `ctx`
pub fn router(ctx: Arc<AppContext>) -> Router {
    let bundle_limit = ctx.max_bundle_bytes;

    Router::new()
        .route("/status", get(routes::status).post(routes::status))
        .route("/version", get(routes::version))
        .route("/wifi", get(routes::wifi_marker).post(routes::apply_wifi))
        .route("/getScan", get(routes::scan))
        .route(
            "/docker",
            get(routes::running_services).post(routes::service_action),
        )
        .route(
            "/docker-custom",
            get(routes::all_services).post(routes::custom_action),
        )
        .route(
            "/update",
            get(routes::update_marker)
                .post(routes::submit_update)
                .layer(DefaultBodyLimit::max(bundle_limit)),
        )
        .route(
            "/ssh-setkey",
            get(routes::key_missing).post(routes::install_key),
        )
        .route("/logs", get(routes::logs))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Running HTTP server
pub struct ApiHandle {
    address: SocketAddr,
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl ApiHandle {
    /// Bind `listen` and serve `ctx` on a background task
    pub async fn spawn(listen: SocketAddr, ctx: Arc<AppContext>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(listen).await?;
        let address = listener.local_addr()?;
        info!(address = %address, "control api listening");

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let server = axum::serve(listener, router(ctx)).with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        });
        let task = tokio::spawn(async move {
            if let Err(err) = server.await {
                warn!(error = %err, "control api exited with error");
            }
        });

        Ok(Self {
            address,
            task,
            shutdown: shutdown_tx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// Stop accepting connections and wait for in-flight requests
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(true);
        self.task.await.map_err(|join| anyhow::anyhow!(join))
    }
}
