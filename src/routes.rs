use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

use crate::common::response::ApiError;
use crate::docs::ApiDoc;
use crate::state::AppState;

pub fn configure_routes() -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .nest("/api/v1", crate::modules::status::router())
        .fallback(|| async { ApiError::not_found("Route") })
        .layer(cors)
}
