//! HTTP request handlers for the health web API.

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

pub mod health;

/// Fallback for every unmatched path
pub async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}
