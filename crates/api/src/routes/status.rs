//! Service endpoints outside the resource routes.

use axum::extract::State;
use axum::http::{StatusCode, Uri};

use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/status
pub async fn status() -> ApiResponse<()> {
    ApiResponse::message("API is running")
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK. The memory backend is
/// always ready.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(pool) = state.storage().pool() else {
        return StatusCode::OK;
    };
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Fallback for unknown routes.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Can't find {} on this server!", uri.path()))
}
