//! HTTP API server.
//!
//! Exposes send, status, logout and restart for the bridged session, plus an
//! unauthenticated health check for liveness checks.

mod auth;
mod handlers;

#[cfg(test)]
mod tests;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::future::Future;
use tracing::info;
use wabridge_core::{config::ApiConfig, error::BridgeError};

use crate::lifecycle::SessionManager;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    manager: SessionManager,
    api_key: String,
}

impl ApiState {
    pub fn new(manager: SessionManager, api_key: &str) -> Self {
        Self {
            manager,
            api_key: api_key.to_string(),
        }
    }
}

/// Build the axum router with shared state.
pub fn build_router(state: ApiState) -> Router {
    // The session id segment is accepted but not checked: one session per process.
    let protected = Router::new()
        .route(
            "/client/sendMessage/{session_id}",
            post(handlers::send_message),
        )
        .route("/session/status/{session_id}", get(handlers::status))
        .route("/session/logout/{session_id}", post(handlers::logout))
        .route("/session/restart/{session_id}", post(handlers::restart))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024)) // 1 MB max request body
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    config: &ApiConfig,
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), BridgeError> {
    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("API server stopped");
    Ok(())
}
