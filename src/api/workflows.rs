/// Workflow REST API endpoints
///
/// Lists and hot-reloads workflow definitions, triggers runs, reports run status
/// and history, and arms or stops recurring schedules. Handlers only forward to
/// the engine; every rule lives in the runtime.

use crate::{
    client::OllamaClient,
    error::EngineError,
    runtime::{
        engine::{RunOutcome, WorkflowExecutor},
        schedule::ScheduleConfig,
        scheduler::Scheduler,
        status::{RunSnapshot, StatusBoard},
    },
    workflow::{
        registry::WorkflowRegistry,
        types::{AppConfig, ExecutionStatus, Workflow, WorkflowExecution},
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Hot-reload registry for apps, workflows and history
    pub registry: Arc<WorkflowRegistry>,
    /// Sequential workflow executor
    pub engine: Arc<WorkflowExecutor>,
    /// Recurring schedule manager
    pub scheduler: Arc<Scheduler>,
    /// Latest node statuses per workflow
    pub board: Arc<StatusBoard>,
    /// Backend client for model management
    pub client: OllamaClient,
}

/// Error body: `{ "error": "..." }` with a status code
pub type ApiError = (StatusCode, Json<Value>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

/// 400 carrying the bare validation message
fn bad_request(err: EngineError) -> ApiError {
    match err {
        EngineError::Validation(message) => api_error(StatusCode::BAD_REQUEST, message),
        other => api_error(StatusCode::BAD_REQUEST, other.to_string()),
    }
}

fn not_found(workflow_id: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("Workflow {} not found", workflow_id))
}

/// Response for workflow update operations
#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub id: String,
    pub message: String,
}

/// Request body for workflow upserts
#[derive(Debug, Deserialize)]
pub struct UpsertWorkflowRequest {
    pub workflow: Workflow,
}

/// Request body for a manual run
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub input: String,
}

/// Request body for arming a schedule
#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub input: String,
    pub config: ScheduleConfig,
}

/// Current run state of a workflow
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub executing: bool,
    #[serde(flatten)]
    pub run: RunSnapshot,
}

/// Create workflow and app routes
pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/apps", get(list_apps))
        .route("/api/apps/{name}", put(upsert_app))
        .route("/api/workflows", get(list_workflows))
        .route(
            "/api/workflows/{id}",
            get(get_workflow).put(upsert_workflow).delete(delete_workflow),
        )
        .route("/api/workflows/{id}/execute", post(execute_workflow))
        .route("/api/workflows/{id}/status", get(workflow_status))
        .route("/api/workflows/{id}/history", get(workflow_history))
        .route(
            "/api/workflows/{id}/schedule",
            get(get_schedule).put(start_schedule).delete(stop_schedule),
        )
}

/// GET /api/apps
async fn list_apps(State(state): State<AppState>) -> Json<Vec<AppConfig>> {
    Json(state.registry.list_apps())
}

/// PUT /api/apps/:name
/// Body: AppConfig; the name in the path wins
async fn upsert_app(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(mut app): Json<AppConfig>,
) -> Json<AppConfig> {
    app.app_name = name;
    tracing::info!("🔥 Hot-reloaded app: {} ({})", app.app_name, app.model);
    state.registry.upsert_app(app.clone());
    Json(app)
}

/// GET /api/workflows
/// Returns: { "workflows": [...] }, pinned first
async fn list_workflows(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "workflows": state.registry.list_workflows() }))
}

/// GET /api/workflows/:id
async fn get_workflow(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Workflow>, ApiError> {
    state.registry.get_workflow(&id).map(Json).ok_or_else(|| not_found(&id))
}

/// PUT /api/workflows/:id
/// Body: { "workflow": { "id": "...", "name": "...", "nodes": [...] } }
async fn upsert_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpsertWorkflowRequest>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    let mut workflow = payload.workflow;
    workflow.id = id;

    if workflow.name.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Workflow name is required"));
    }
    workflow.validate().map_err(bad_request)?;

    let response = WorkflowResponse {
        id: workflow.id.clone(),
        message: format!("Workflow '{}' saved successfully", workflow.name),
    };
    state.registry.upsert_workflow(workflow);
    Ok(Json(response))
}

/// DELETE /api/workflows/:id
/// Stops any armed schedule; runs already in flight finish
async fn delete_workflow(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    state.scheduler.stop(&id);

    if state.registry.remove_workflow(&id) {
        tracing::info!("Deleted workflow: {}", id);
        Ok(Json(json!({ "message": "Workflow deleted successfully" })))
    } else {
        Err(not_found(&id))
    }
}

/// POST /api/workflows/:id/execute
/// Body: { "input": "..." }
/// The run is spawned, so a client that disconnects does not cancel it
async fn execute_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ExecuteRequest>,
) -> Result<Json<WorkflowExecution>, ApiError> {
    let workflow = state.registry.get_workflow(&id).ok_or_else(|| not_found(&id))?;

    tracing::info!("📥 Manual run requested for workflow: {}", id);
    let engine = Arc::clone(&state.engine);
    let run = tokio::spawn(async move { engine.execute_workflow(&workflow, &payload.input).await });

    let outcome = run.await.map_err(|e| {
        tracing::error!("❌ Run task for workflow {} failed: {}", id, e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Run of workflow {} aborted", id))
    })?;

    match outcome {
        Ok(RunOutcome::Completed(execution)) => Ok(Json(execution)),
        Ok(RunOutcome::AlreadyRunning) => Err(api_error(
            StatusCode::CONFLICT,
            format!("Workflow {} is already executing", id),
        )),
        Err(e @ EngineError::Validation(_)) => Err(bad_request(e)),
        Err(e) => Err(api_error(StatusCode::BAD_GATEWAY, e.to_string())),
    }
}

/// GET /api/workflows/:id/status
/// Before the first run every node reports `pending`
async fn workflow_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let workflow = state.registry.get_workflow(&id).ok_or_else(|| not_found(&id))?;

    let run = state.board.snapshot(&id).unwrap_or_else(|| RunSnapshot {
        statuses: workflow
            .ordered_nodes()
            .into_iter()
            .map(|node| ExecutionStatus::pending(node.id.clone()))
            .collect(),
        final_output: None,
    });

    Ok(Json(StatusResponse {
        executing: state.engine.is_executing(&id),
        run,
    }))
}

/// GET /api/workflows/:id/history
/// Returns completed runs, most recent first
async fn workflow_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<WorkflowExecution>>, ApiError> {
    if state.registry.get_workflow(&id).is_none() {
        return Err(not_found(&id));
    }
    Ok(Json(state.registry.history(&id)))
}

/// GET /api/workflows/:id/schedule
async fn get_schedule(State(state): State<AppState>, Path(id): Path<String>) -> Json<Value> {
    match state.scheduler.info(&id) {
        Some(schedule) => Json(json!({ "armed": true, "schedule": schedule })),
        None => Json(json!({ "armed": false })),
    }
}

/// PUT /api/workflows/:id/schedule
/// Body: { "input": "...", "config": { "type": "daily", "time": "09:00" } }
async fn start_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ScheduleRequest>,
) -> Result<Json<Value>, ApiError> {
    let workflow = state.registry.get_workflow(&id).ok_or_else(|| not_found(&id))?;

    let schedule = state
        .scheduler
        .start(workflow, payload.input, payload.config)
        .map_err(bad_request)?;

    Ok(Json(json!({
        "armed": true,
        "nextFireTime": schedule.next_fire_time,
        "schedule": schedule,
    })))
}

/// DELETE /api/workflows/:id/schedule
async fn stop_schedule(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    if state.scheduler.stop(&id) {
        Ok(Json(json!({ "message": "Schedule stopped" })))
    } else {
        Err(api_error(StatusCode::NOT_FOUND, format!("No schedule armed for workflow {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{BackendConfig, ExecutorConfig},
        runtime::{
            executor::NodeExecutor,
            status::StatusSink,
            testing::{by_model, registry_with, workflow, FnBackend},
        },
    };
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request},
    };
    use tower::ServiceExt;

    fn state_with(backend: FnBackend, registry: Arc<WorkflowRegistry>, retries: u32) -> AppState {
        let board = Arc::new(StatusBoard::new());
        let sink: Arc<dyn StatusSink> = board.clone();
        let executor = Arc::new(NodeExecutor::new(
            Arc::new(backend),
            Arc::clone(&registry),
            Arc::clone(&sink),
            ExecutorConfig {
                max_retries: retries,
                retry_delay_ms: 0,
            },
        ));
        let engine = Arc::new(WorkflowExecutor::new(executor, Arc::clone(&registry), sink));
        AppState {
            scheduler: Arc::new(Scheduler::new(Arc::clone(&engine))),
            registry,
            engine,
            board,
            client: OllamaClient::new(BackendConfig::default()),
        }
    }

    fn state() -> AppState {
        let registry = registry_with(&["Upper", "Bang"]);
        registry.upsert_workflow(workflow("wf", &["Upper", "Bang"]));
        state_with(FnBackend::new(by_model), registry, 0)
    }

    async fn call(state: &AppState, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = create_workflow_routes()
            .with_state(state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn execute_runs_chain_and_records_history() {
        let state = state();

        let (status, body) = call(
            &state,
            Method::POST,
            "/api/workflows/wf/execute",
            Some(json!({ "input": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["finalOutput"], "HI!");
        assert_eq!(body["nodes"].as_array().unwrap().len(), 2);

        let (_, history) = call(&state, Method::GET, "/api/workflows/wf/history", None).await;
        assert_eq!(history.as_array().unwrap().len(), 1);

        let (_, status_body) = call(&state, Method::GET, "/api/workflows/wf/status", None).await;
        assert_eq!(status_body["executing"], false);
        assert_eq!(status_body["finalOutput"], "HI!");
        assert_eq!(status_body["statuses"][1]["status"], "completed");
    }

    #[tokio::test]
    async fn status_before_first_run_is_pending() {
        let state = state();
        let (status, body) = call(&state, Method::GET, "/api/workflows/wf/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["statuses"][0]["nodeId"], "n0");
        assert_eq!(body["statuses"][0]["status"], "pending");
    }

    #[tokio::test]
    async fn execute_maps_engine_errors_to_status_codes() {
        let registry = registry_with(&["Upper", "Broken"]);
        registry.upsert_workflow(workflow("bad", &["Upper", "Broken"]));
        registry.upsert_workflow(workflow("ghost", &["Ghost"]));
        let state = state_with(FnBackend::new(by_model), registry, 0);

        let input = Some(json!({ "input": "x" }));
        let (status, body) = call(&state, Method::POST, "/api/workflows/bad/execute", input.clone()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("n1"));

        let (status, _) = call(&state, Method::POST, "/api/workflows/ghost/execute", input.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&state, Method::POST, "/api/workflows/nope/execute", input).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(state.registry.history_len("bad"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_execute_conflicts() {
        let registry = registry_with(&["Upper"]);
        registry.upsert_workflow(workflow("wf", &["Upper"]));
        let backend = FnBackend::new(by_model).with_latency(std::time::Duration::from_secs(1));
        let state = state_with(backend, registry, 0);

        let input = Some(json!({ "input": "x" }));
        let (first, second) = tokio::join!(
            call(&state, Method::POST, "/api/workflows/wf/execute", input.clone()),
            call(&state, Method::POST, "/api/workflows/wf/execute", input.clone()),
        );
        let mut codes = [first.0, second.0];
        codes.sort();
        assert_eq!(codes, [StatusCode::OK, StatusCode::CONFLICT]);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnected_client_does_not_cancel_the_run() {
        let registry = registry_with(&["Upper"]);
        registry.upsert_workflow(workflow("wf", &["Upper"]));
        let backend = FnBackend::new(by_model).with_latency(std::time::Duration::from_secs(10));
        let state = state_with(backend, registry, 0);

        let request = call(&state, Method::POST, "/api/workflows/wf/execute", Some(json!({ "input": "x" })));
        assert!(tokio::time::timeout(std::time::Duration::from_secs(1), request).await.is_err());

        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        assert!(!state.engine.is_executing("wf"));
        assert_eq!(state.registry.history_len("wf"), 1);
        let snapshot = state.board.snapshot("wf").unwrap();
        assert_eq!(snapshot.statuses[0].state, crate::workflow::types::NodeState::Completed);
        assert_eq!(snapshot.final_output.as_deref(), Some("X"));
    }

    #[tokio::test]
    async fn upsert_validates_positions() {
        let state = state();
        let mut broken = workflow("new", &["Upper", "Bang"]);
        broken.nodes[1].position = 0;

        let (status, _) = call(
            &state,
            Method::PUT,
            "/api/workflows/new",
            Some(json!({ "workflow": broken })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(state.registry.get_workflow("new").is_none());

        let (status, body) = call(
            &state,
            Method::PUT,
            "/api/workflows/new",
            Some(json!({ "workflow": workflow("ignored", &["Bang"]) })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "new");

        let (_, listed) = call(&state, Method::GET, "/api/workflows", None).await;
        assert_eq!(listed["workflows"].as_array().unwrap().len(), 2);

        let (status, _) = call(&state, Method::DELETE, "/api/workflows/new", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&state, Method::GET, "/api/workflows/new", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn schedule_lifecycle() {
        let state = state();

        let (status, body) = call(
            &state,
            Method::PUT,
            "/api/workflows/wf/schedule",
            Some(json!({ "input": "x", "config": { "type": "daily" } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please select a time for daily execution");

        let (status, body) = call(
            &state,
            Method::PUT,
            "/api/workflows/wf/schedule",
            Some(json!({ "input": "x", "config": { "type": "interval", "interval": 30 } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["nextFireTime"].is_string());

        let (_, body) = call(&state, Method::GET, "/api/workflows/wf/schedule", None).await;
        assert_eq!(body["armed"], true);
        assert_eq!(body["schedule"]["config"]["interval"], 30);

        let (status, _) = call(&state, Method::DELETE, "/api/workflows/wf/schedule", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&state, Method::DELETE, "/api/workflows/wf/schedule", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn apps_can_be_listed_and_replaced() {
        let state = state();
        let mut app = crate::runtime::testing::app("ignored");
        app.model = "mistral:7b".into();

        let (status, body) = call(&state, Method::PUT, "/api/apps/Bang", Some(json!(app))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["appName"], "Bang");
        assert_eq!(state.registry.get_app("Bang").unwrap().model, "mistral:7b");

        let (_, body) = call(&state, Method::GET, "/api/apps", None).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }
}
