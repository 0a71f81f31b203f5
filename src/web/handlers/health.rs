//! # Health Check Handler

use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use crate::orchestration::HealthSnapshot;
use crate::web::state::WebState;

/// Basic health check endpoint: GET /health
///
/// Persona count, uptime, governor counters and per-persona wake status.
pub async fn health_check(State(state): State<Arc<WebState>>) -> Json<HealthSnapshot> {
    Json(state.snapshot().await)
}
