//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;

use vmix_worker::OUTPUTS_ROUTE;

use crate::handlers::{create_audio_replace_job, create_compose_job, get_job, health, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let job_routes = Router::new()
        .route("/jobs/compose", post(create_compose_job))
        .route("/jobs/audio-replace", post(create_audio_replace_job))
        .route("/jobs/:job_id", get(get_job));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || std::future::ready(handle.render())))
    } else {
        Router::new()
    };

    // Published outputs, with Range support
    let outputs = ServeDir::new(&state.public_dir);

    Router::new()
        .nest("/api", job_routes)
        .nest_service(OUTPUTS_ROUTE, outputs)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use vmix_models::{CompositionJob, JobId, JobKind, JobRecord};
    use vmix_store::{JobStore, MemoryJobStore};
    use vmix_worker::{JobExecutor, JobRegistry, Pipeline, WorkerConfig};

    use crate::config::ApiConfig;

    struct TestApp {
        state: AppState,
        store: Arc<MemoryJobStore>,
        _dir: tempfile::TempDir,
    }

    fn test_app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let public_dir = dir.path().join("public");
        std::fs::create_dir_all(&public_dir).unwrap();
        let worker_config = WorkerConfig {
            work_dir: dir.path().join("work"),
            public_dir: public_dir.clone(),
            ..WorkerConfig::default()
        };
        let store = Arc::new(MemoryJobStore::new());
        let pipeline = Pipeline::new(worker_config, store.clone(), JobRegistry::new()).unwrap();
        let state = AppState::with_executor(
            ApiConfig::default(),
            JobExecutor::new(pipeline),
            public_dir,
        );
        TestApp {
            state,
            store,
            _dir: dir,
        }
    }

    fn router(app: &TestApp) -> Router {
        create_router(app.state.clone(), None)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let response = router(&app)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_compose_rejects_single_video_without_work() {
        let app = test_app();
        let response = router(&app)
            .oneshot(post_json(
                "/api/jobs/compose",
                json!({"video_urls": ["https://a.example/1.mp4"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["detail"].is_string());
    }

    #[tokio::test]
    async fn test_compose_rejects_malformed_json() {
        let app = test_app();
        let response = router(&app)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/jobs/compose")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["detail"].is_string());
    }

    #[tokio::test]
    async fn test_audio_replace_is_accepted() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let app = test_app();
        let response = router(&app)
            .oneshot(post_json(
                "/api/jobs/audio-replace",
                json!({
                    "job_id": "replace-1",
                    "video_url": format!("{}/v.mp4", server.uri()),
                    "audio_url": format!("{}/a.mp3", server.uri()),
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["job_id"], "replace-1");
        assert_eq!(body["status"], "processing_started");
    }

    #[tokio::test]
    async fn test_in_flight_job_id_conflicts() {
        let app = test_app();
        app.state
            .executor
            .registry()
            .try_register(CompositionJob::new(JobId::from("busy"), JobKind::Compose, None))
            .await
            .unwrap();

        let response = router(&app)
            .oneshot(post_json(
                "/api/jobs/compose",
                json!({
                    "job_id": "busy",
                    "video_urls": ["https://a.example/1.mp4", "https://a.example/2.mp4"]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_lipsync_without_provider_is_unavailable() {
        let app = test_app();
        let response = router(&app)
            .oneshot(post_json(
                "/api/jobs/compose",
                json!({
                    "video_urls": ["https://a.example/1.mp4"],
                    "music_url": "https://a.example/voice.mp3",
                    "lipsync": {}
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_get_job_from_registry_then_store() {
        let app = test_app();
        app.state
            .executor
            .registry()
            .try_register(CompositionJob::new(JobId::from("live"), JobKind::Compose, None))
            .await
            .unwrap();
        let mut record = JobRecord::started(JobId::from("stored"), JobKind::AudioReplace);
        record.status = "failed".to_string();
        record.error_message = Some("Download failed".to_string());
        app.store.upsert(&record).await.unwrap();

        let response = router(&app)
            .oneshot(Request::builder().uri("/api/jobs/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "processing_started");

        let response = router(&app)
            .oneshot(Request::builder().uri("/api/jobs/stored").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "failed");
        assert_eq!(body["error"], "Download failed");

        let response = router(&app)
            .oneshot(Request::builder().uri("/api/jobs/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_outputs_support_byte_ranges() {
        let app = test_app();
        std::fs::write(app.state.public_dir.join("compose_x_1.mp4"), b"0123456789").unwrap();

        let response = router(&app)
            .oneshot(
                Request::builder()
                    .uri("/outputs/compose_x_1.mp4")
                    .header(header::RANGE, "bytes=2-5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], b"2345");
    }
}
