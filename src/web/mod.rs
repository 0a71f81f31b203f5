//! # Health Web API
//!
//! A single read-only endpoint for process supervisors: `GET /health`.
//! Every other path answers 404. The server shares the daemon through
//! [`WebState`] and never mutates it.

use axum::Router;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::error::{PersonaError, Result};

pub mod handlers;
pub mod routes;
pub mod state;

pub use state::WebState;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the health application
pub fn create_app(state: Arc<WebState>) -> Router {
    let common_middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT));

    Router::new()
        .merge(routes::health_routes())
        .fallback(handlers::not_found)
        .layer(common_middleware)
        .with_state(state)
}

/// Bind `bind_address` and serve until `shutdown` resolves
pub async fn serve(
    state: Arc<WebState>,
    bind_address: &str,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(|e| PersonaError::Internal(format!("cannot bind health endpoint {bind_address}: {e}")))?;
    info!(bind_address = %bind_address, "🩺 HEALTH: Listening");

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| PersonaError::Internal(format!("health server failed: {e}")))
}
