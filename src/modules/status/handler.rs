use super::dto::{HealthResponse, ProfileResponse};
use crate::common::response::{ApiResponse, ApiSuccess};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse};

/// Liveness plus encoder and run counters
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service is up", body = ApiResponse<HealthResponse>)
    ),
    tag = "Status"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let body = HealthResponse {
        status: "ok".to_string(),
        encoder: state.encoder_version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        fan_out: state.config.fan_out.to_string(),
        encode_concurrency: state.config.encode_concurrency(),
        stats: state.stats.snapshot(),
    };

    ApiSuccess::ok(body, "Service healthy")
}

/// Active rendition profiles, in dispatch order
#[utoipa::path(
    get,
    path = "/api/v1/profiles",
    responses(
        (status = 200, description = "Active profiles", body = ApiResponse<Vec<ProfileResponse>>)
    ),
    tag = "Status"
)]
pub async fn list_profiles(State(state): State<AppState>) -> impl IntoResponse {
    let profiles: Vec<ProfileResponse> = state
        .config
        .profiles
        .iter()
        .map(|p| ProfileResponse::from(*p))
        .collect();

    ApiSuccess::ok(profiles, "Profiles retrieved successfully")
}
