use axum::Router;
use axum::routing::get;

use crate::state::AppState;

pub mod dto;
pub mod handler;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(handler::health))
        .route("/profiles", get(handler::list_profiles))
}
