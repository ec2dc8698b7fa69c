// crates/server/src/lib.rs
//! dupe-manager server library.
//!
//! Runs scan jobs, keeps their live status and streams progress to
//! connected clients, on top of the `dupe-manager-db` job store.

pub mod config;
pub mod decisions;
pub mod error;
pub mod jobs;
pub mod live;
pub mod metrics;
pub mod routes;
pub mod state;

pub use error::*;
pub use metrics::init_metrics;
pub use routes::api_routes;
pub use state::AppState;

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
pub fn create_app(state: Arc<AppState>) -> Router {
    create_app_with_static(state, None)
}

/// Like [`create_app`], additionally serving a frontend from `static_dir`
/// for every path no API route claims.
pub fn create_app_with_static(state: Arc<AppState>, static_dir: Option<&Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = api_routes(state);
    if let Some(dir) = static_dir {
        tracing::info!(static_dir = %dir.display(), "Serving static frontend");
        router = router.fallback_service(
            ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
        );
    }

    router.layer(cors).layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobSettings;
    use crate::live::LiveServices;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use dupe_manager_db::Database;
    use tower::ServiceExt;

    async fn app() -> Router {
        let db = Database::new_in_memory().await.unwrap();
        create_app(AppState::new(
            db,
            LiveServices::memory(),
            JobSettings::default(),
            false,
        ))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, body) = get(app().await, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["live_backend"], "memory");
        assert!(json["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn test_metrics_outside_api_prefix() {
        init_metrics();
        let (status, _) = get(app().await, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = get(app().await, "/api/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let response = app()
            .await
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/health")
                    .header("Origin", "http://localhost:3000")
                    .header("Access-Control-Request-Method", "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response
            .headers()
            .contains_key("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn test_static_fallback_serves_index() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("index.html"), "<html>dupes</html>").unwrap();
        let db = Database::new_in_memory().await.unwrap();
        let app = create_app_with_static(
            AppState::new(db, LiveServices::none(), JobSettings::default(), false),
            Some(tmp.path()),
        );

        let (status, body) = get(app.clone(), "/some/client/route").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("dupes"));

        let (status, _) = get(app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
    }
}
