use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use log::*;

use crate::controller::ApiResponse;
use crate::AppState;

/// GET liveness of the API router
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "API router is up and responding to requests", body = String),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "healthy")
}

/// GET health of every configured transcription, extraction and notification provider
#[utoipa::path(
    get,
    path = "/health/providers",
    responses(
        (status = 200, description = "Every provider is healthy", body = domain::pipeline::ProviderHealth),
        (status = 503, description = "At least one provider is unhealthy", body = domain::pipeline::ProviderHealth)
    )
)]
pub async fn providers(State(app_state): State<AppState>) -> impl IntoResponse {
    debug!("GET provider health");

    let health = app_state.orchestrator.health().await;
    let status = if health.all_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ApiResponse::new(status.into(), health)))
}
