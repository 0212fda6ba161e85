use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers::{PipelineOrchestrator, RunOutcome};
use crate::models::{ErrorInfo, ImageCandidate, PipelineState};
use crate::services::cards::{render_report, ItemCard};

pub struct AppState {
    pub pipeline: Arc<PipelineOrchestrator>,
}

/// What the page polls to draw the progress bar and result cards.
#[derive(Debug, Serialize)]
pub struct StateView {
    pub generation: u64,
    pub state: PipelineState,
    pub percent: u8,
    pub label: Option<&'static str>,
    pub cards: Option<Vec<ItemCard>>,
}

impl StateView {
    pub fn new(generation: u64, state: PipelineState) -> Self {
        let cards = match &state {
            PipelineState::Succeeded { report } => Some(render_report(report)),
            _ => None,
        };

        Self {
            generation,
            percent: state.percent(),
            label: state.label(),
            state,
            cards,
        }
    }
}

pub fn create_router(pipeline: Arc<PipelineOrchestrator>, max_upload_bytes: usize) -> Router {
    let state = Arc::new(AppState { pipeline });

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/image", post(select_image).delete(clear_image))
        .route("/analyze", post(analyze))
        .route("/state", get(get_state))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn current_view(pipeline: &PipelineOrchestrator) -> StateView {
    let (generation, state) = pipeline.snapshot();
    StateView::new(generation, state)
}

fn conflict(message: &str) -> Response {
    (StatusCode::CONFLICT, Json(json!({ "error": { "message": message } }))).into_response()
}

async fn select_image(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let declared_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    log::info!("📸 Image received: {} bytes, type {:?}", body.len(), declared_type);

    let candidate = ImageCandidate {
        bytes: body.to_vec(),
        declared_type,
    };

    match state.pipeline.select_image(candidate) {
        Ok(preview) => Json(json!({
            "generation": preview.generation,
            "preview": preview.data_url,
            "state": current_view(&state.pipeline),
        }))
        .into_response(),
        Err(e) => {
            let error = ErrorInfo::from_error(&e, None);
            (StatusCode::UNSUPPORTED_MEDIA_TYPE, Json(json!({ "error": error }))).into_response()
        }
    }
}

async fn clear_image(State(state): State<Arc<AppState>>) -> Json<StateView> {
    state.pipeline.clear();
    Json(current_view(&state.pipeline))
}

async fn analyze(State(state): State<Arc<AppState>>) -> Response {
    match state.pipeline.run().await {
        RunOutcome::Finished { generation, state } => {
            Json(StateView::new(generation, state)).into_response()
        }
        RunOutcome::Superseded => conflict("Analysis superseded by a newer image"),
        RunOutcome::NothingSelected => conflict("Select an image first"),
    }
}

async fn get_state(State(state): State<Arc<AppState>>) -> Json<StateView> {
    Json(current_view(&state.pipeline))
}

async fn root_handler() -> &'static str {
    "Food Nutrition Analyzer - POST an image to /image, then POST /analyze"
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::LogProgressSink;
    use crate::models::{AnalysisError, HostedImageRef, RawInferencePayload, SourceImage};
    use crate::services::{HostingClient, InferenceClient};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    struct StubHosting;

    #[async_trait::async_trait]
    impl HostingClient for StubHosting {
        async fn upload(&self, _image: &SourceImage) -> Result<HostedImageRef, AnalysisError> {
            Ok(HostedImageRef {
                url: "https://i.ibb.co/meal.jpg".to_string(),
            })
        }
    }

    struct StubInference(&'static str);

    #[async_trait::async_trait]
    impl InferenceClient for StubInference {
        async fn analyze(&self, _image: &HostedImageRef) -> Result<RawInferencePayload, AnalysisError> {
            Ok(RawInferencePayload(self.0.to_string()))
        }
    }

    fn router(content: &'static str) -> Router {
        let pipeline = Arc::new(PipelineOrchestrator::new(
            Arc::new(StubHosting),
            Arc::new(StubInference(content)),
            Arc::new(LogProgressSink),
            Duration::ZERO,
        ));
        create_router(pipeline, 1024)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn upload(content_type: &str, bytes: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/image")
            .header("content-type", content_type)
            .body(Body::from(bytes))
            .unwrap()
    }

    fn empty(method: &str, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_upload_then_analyze_renders_cards() {
        let app = router(r#"{"items":[{"item_name":"Apple","total_calories":95,"total_protien":0.5,"toal_carbs":25,"toal_fats":0.3}]}"#);

        let (status, body) = send(&app, upload("image/png", vec![0x89, 0x50, 0x4E, 0x47])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["state"]["status"], "preview_ready");
        assert!(body["preview"].as_str().unwrap().starts_with("data:image/png;base64,"));

        let (status, body) = send(&app, empty("POST", "/analyze")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["status"], "succeeded");
        assert_eq!(body["generation"], 2);
        assert_eq!(body["percent"], 100);
        assert_eq!(body["cards"][0]["title"], "Apple");
        assert_eq!(body["cards"][0]["nutrients"][0]["display_percent"], 5);
    }

    #[tokio::test]
    async fn test_non_image_upload_is_rejected() {
        let app = router(r#"{"items":[]}"#);

        let (status, body) = send(&app, upload("application/pdf", b"%PDF".to_vec())).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["error"]["kind"], "invalid_media_type");
        assert_eq!(body["error"]["message"], "Please upload an image file");

        let (_, body) = send(&app, empty("GET", "/state")).await;
        assert_eq!(body["state"]["status"], "idle");
    }

    #[tokio::test]
    async fn test_analyze_without_image_is_conflict() {
        let app = router(r#"{"items":[]}"#);
        let (status, _) = send(&app, empty("POST", "/analyze")).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_empty_result_is_surfaced_as_failed_state() {
        let app = router(r#"{"items":[]}"#);
        send(&app, upload("image/jpeg", vec![0xFF, 0xD8])).await;

        let (status, body) = send(&app, empty("POST", "/analyze")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["status"], "failed");
        assert_eq!(body["state"]["error"]["kind"], "empty_result");
        assert_eq!(body["percent"], 0);
        assert!(body["cards"].is_null());
    }

    #[tokio::test]
    async fn test_delete_image_returns_to_idle() {
        let app = router(r#"{"items":[]}"#);
        send(&app, upload("image/jpeg", vec![0xFF, 0xD8])).await;

        let (status, body) = send(&app, empty("DELETE", "/image")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["status"], "idle");
        assert_eq!(body["generation"], 2);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let app = router(r#"{"items":[]}"#);
        let (status, _) = send(&app, upload("image/jpeg", vec![0u8; 4096])).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(r#"{"items":[]}"#);
        let response = app.oneshot(empty("GET", "/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
