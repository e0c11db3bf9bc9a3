//! HTTP server.
//!
//! Binds the API router and serves it until the cancellation token fires,
//! then drains in-flight requests.

use crate::error::AppError;
use crate::services::http_api::{api_routes, ApiState};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Build the full application router.
pub fn app(state: ApiState) -> Router {
    api_routes(state).layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve the API until `shutdown` is cancelled.
pub async fn serve(
    addr: SocketAddr,
    state: ApiState,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    serve_on(listener, state, shutdown).await
}

/// Serve the API on an already bound listener.
pub async fn serve_on(
    listener: TcpListener,
    state: ApiState,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("[server] Listening on http://{}", addr);
    }

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    log::info!("[server] Server stopped");
    Ok(())
}
