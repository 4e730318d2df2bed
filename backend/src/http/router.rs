//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Permissive CORS; restrict origins when deployed behind a public host.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.config.server.body_limit_mb * 1024 * 1024;

    let api_v1 = Router::new()
        // Stations
        .route("/stations", get(handlers::list_stations))
        .route("/stations/search", get(handlers::search_stations))
        .route("/stations/nearest", get(handlers::nearest_stations))
        .route("/stations/refresh", post(handlers::refresh_stations))
        .route("/stations/{station_id}", get(handlers::get_station))
        .route("/stations/{station_id}/profile", get(handlers::get_station_profile))
        // Series and analysis
        .route("/stations/{station_id}/series/{metric}", get(handlers::get_series))
        .route(
            "/stations/{station_id}/series/{metric}/rolling",
            get(handlers::get_rolling_stats),
        )
        .route(
            "/stations/{station_id}/series/{metric}/stationarity",
            get(handlers::get_stationarity),
        )
        .route(
            "/stations/{station_id}/series/{metric}/decomposition",
            get(handlers::get_decomposition),
        )
        // Evaluation jobs
        .route("/evaluations", post(handlers::create_evaluation))
        .route("/jobs/{job_id}", get(handlers::get_job_status))
        .route("/jobs/{job_id}/logs", get(handlers::stream_job_logs));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::repositories::LocalRepository;
    use crate::feed::{FeedDocuments, StaticFeedSource};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let state = AppState::new(
            Arc::new(LocalRepository::new()),
            Arc::new(StaticFeedSource::new(FeedDocuments::default())),
            AppConfig::default(),
        );
        create_router(state)
    }

    async fn get(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn test_health_route() {
        let (status, body) = get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_station_is_404() {
        let (status, body) = get("/v1/stations/5").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_unknown_metric_is_client_error() {
        let (status, _) = get("/v1/stations/72/series/bogus").await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn test_empty_series_route() {
        let (status, body) = get("/v1/stations/72/series/net_flow?granularity=1h").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metric"], "net_flow");
        assert!(body["points"].as_array().unwrap().is_empty());
    }
}
