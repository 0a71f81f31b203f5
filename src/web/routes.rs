//! Route definitions for the health web API.

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::web::{handlers, state::WebState};

/// Health check routes for process supervisors
pub fn health_routes() -> Router<Arc<WebState>> {
    Router::new().route("/health", get(handlers::health::health_check))
}
