/// Model management and direct generation endpoints
///
/// Thin wrappers over the backend client: list, pull and delete models, probe
/// availability, and run one streamed completion outside any workflow.

use crate::{
    api::workflows::{api_error, ApiError, AppState},
    client::{collect_stream, GenerateRequest, ModelInfo, StreamEvent},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Request body for a model pull
#[derive(Debug, Deserialize)]
pub struct PullRequest {
    pub name: String,
}

/// One entry of a pull transcript
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullEvent {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
}

/// Create model management routes
pub fn create_model_routes() -> Router<AppState> {
    Router::new()
        .route("/api/models", get(list_models))
        .route("/api/models/pull", post(pull_model))
        .route("/api/models/{name}", delete(delete_model))
        .route("/api/backend/health", get(backend_health))
        .route("/api/generate", post(generate))
}

/// GET /api/models
async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<ModelInfo>>, ApiError> {
    state
        .client
        .list_models()
        .await
        .map(Json)
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, e.to_string()))
}

/// POST /api/models/pull
/// Body: { "name": "llama2:7b" }
/// Drains the progress stream and returns it as a transcript
async fn pull_model(State(state): State<AppState>, Json(payload): Json<PullRequest>) -> Result<Json<Value>, ApiError> {
    let mut progress = state.client.pull_model(&payload.name);
    let mut events = Vec::new();

    while let Some(event) = progress.next().await {
        match event {
            Ok(StreamEvent::Item(line)) => {
                let percentage = line.percentage();
                if let Some(percentage) = percentage {
                    tracing::debug!("📦 {} {}: {:.1}%", payload.name, line.status, percentage);
                }
                events.push(PullEvent {
                    status: line.status,
                    percentage,
                });
            }
            Ok(StreamEvent::Restarted { attempt, reason }) => {
                tracing::warn!("⚠️ Pull of {} restarted (attempt {}): {}", payload.name, attempt, reason);
                events.push(PullEvent {
                    status: format!("restarting: {}", reason),
                    percentage: None,
                });
            }
            Err(e) => {
                tracing::error!("❌ Pull of {} failed: {}", payload.name, e);
                return Err(api_error(StatusCode::BAD_GATEWAY, e.to_string()));
            }
        }
    }

    tracing::info!("✅ Pulled model {}", payload.name);
    Ok(Json(json!({ "model": payload.name, "events": events })))
}

/// DELETE /api/models/:name
async fn delete_model(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<Value>, ApiError> {
    state
        .client
        .delete_model(&name)
        .await
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, e.to_string()))?;
    Ok(Json(json!({ "message": format!("Model {} deleted", name) })))
}

/// GET /api/backend/health
async fn backend_health(State(state): State<AppState>) -> Json<Value> {
    let available = state.client.check_available().await;
    Json(json!({
        "available": available,
        "baseUrl": state.client.config().base_url,
    }))
}

/// POST /api/generate
/// Body: { "model": "...", "prompt": "...", "system": "...", "options": {...} }
/// Streams from the backend and returns the assembled text
async fn generate(State(state): State<AppState>, Json(request): Json<GenerateRequest>) -> Result<Json<Value>, ApiError> {
    let stream = state.client.generate_completion_stream(&request);
    let mut chunks = 0usize;

    let response = collect_stream(stream, |_| chunks += 1)
        .await
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, e.to_string()))?;

    tracing::debug!("📤 Direct generation on {} assembled from {} chunks", request.model, chunks);
    Ok(Json(json!({ "model": request.model, "response": response, "chunks": chunks })))
}
