//! HTTP surface
//!
//! Endpoint creation, raw request ingestion, and the live SSE stream, plus
//! the serve loop that binds them. The router is a pure function of
//! [`AppState`] so tests drive it directly without a socket.

pub mod config;
pub mod ip;
pub mod response;
pub mod routes;

pub use config::ServerConfig;
pub use routes::{router, AppState};

use std::net::SocketAddr;
use std::sync::Arc;

/// Bind and serve until interrupted.
pub async fn serve(state: Arc<AppState>) -> std::io::Result<()> {
    let addr = state.config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "HTTP server listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Could not install shutdown handler");
        return;
    }

    tracing::info!("Shutdown signal received, draining connections");
}
