//! Liveness and dependency health.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use configd_core::{DependencyStatus, HealthResponse};

use crate::context::AppContext;

/// GET /health -- checks the store with a cheap query and reports the
/// cache's recent error state. Never fails the process; a down dependency
/// is reported, not panicked on.
pub async fn health_check(State(ctx): State<AppContext>) -> impl IntoResponse {
    let database = match ctx.store.list_organizations().await {
        Ok(_) => DependencyStatus::Ok,
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unreachable");
            DependencyStatus::Down
        }
    };

    let errors_before = ctx.cache.stats().errors;
    ctx.cache.get("health:ping").await;
    let cache =
        if ctx.cache.stats().errors > errors_before { DependencyStatus::Down } else { DependencyStatus::Ok };

    let response = HealthResponse { status: "ok", database, cache };
    let status = if response.healthy() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(response))
}
