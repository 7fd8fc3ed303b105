use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    crate::routes::configure_routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::test_config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let dir = std::env::temp_dir();
        let state = AppState::new(Arc::new(test_config(&dir)), "ffmpeg version test".into());
        create_app(state)
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_encoder_and_counters() {
        let (status, body) = get_json("/api/v1/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["status"], "ok");
        assert_eq!(body["data"]["encoder"], "ffmpeg version test");
        assert_eq!(body["data"]["fan_out"], "concurrent");
        assert_eq!(body["data"]["encode_concurrency"], 2);
        assert_eq!(body["data"]["stats"]["in_flight"], 0);
    }

    #[tokio::test]
    async fn profiles_listed_in_dispatch_order() {
        let (status, body) = get_json("/api/v1/profiles").await;

        assert_eq!(status, StatusCode::OK);
        let labels: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["label"].as_str().unwrap())
            .collect();
        assert_eq!(labels, ["360p", "480p", "720p"]);
        assert_eq!(body["data"][2]["width"], 1280);
    }

    #[tokio::test]
    async fn openapi_document_served() {
        let (status, body) = get_json("/api-docs/openapi.json").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/v1/health"].is_object());
        assert!(body["paths"]["/api/v1/profiles"].is_object());
    }

    #[tokio::test]
    async fn unknown_route_uses_error_envelope() {
        let (status, body) = get_json("/nope").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Route not found");
        assert!(body["data"].is_null());
    }
}
