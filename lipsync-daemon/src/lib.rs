//! lipsync daemon library: router builder for testing and serving.

mod state;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lipsync_core::{GenerateError, GenerationRequest};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub use state::{AppState, LastRun, RunState, RunStatus};

/// Build the axum Router with the given state (used by main and tests).
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/hparams", get(hparams))
        .route("/generate", post(generate))
        .route("/result", get(result))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.runs.last())
}

async fn hparams(State(state): State<AppState>) -> impl IntoResponse {
    state.hparams.debug_string()
}

fn status_for(e: &GenerateError) -> StatusCode {
    match e {
        // An external collaborator failed.
        GenerateError::Synthesis(_) | GenerateError::Conversion(_) | GenerateError::ExternalProcess { .. } => {
            StatusCode::BAD_GATEWAY
        }
        GenerateError::Unclassified(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> impl IntoResponse {
    let generator = Arc::clone(&state.generator);
    let runs = Arc::clone(&state.runs);
    let joined = tokio::task::spawn_blocking(move || runs.run_exclusive(|| generator.generate(&request))).await;
    match joined {
        Ok(Ok(path)) => (
            StatusCode::OK,
            Json(serde_json::json!({ "output_path": path })),
        ),
        Ok(Err(e)) => (
            status_for(&e),
            Json(serde_json::json!({ "error": e.user_message(), "kind": e.kind() })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": format!("generation task failed: {e}"), "kind": "unclassified" })),
        ),
    }
}

async fn result(State(state): State<AppState>) -> Response {
    let Some(path) = state.runs.last_output() else {
        return (StatusCode::NOT_FOUND, "no result yet").into_response();
    };
    match tokio::fs::read(&path).await {
        Ok(video) => {
            let mut res = Response::new(Body::from(video));
            res.headers_mut().insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("video/mp4"),
            );
            res
        }
        Err(_) => (StatusCode::NOT_FOUND, "result no longer on disk").into_response(),
    }
}
