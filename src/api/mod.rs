/// HTTP API Layer
///
/// This module provides the REST API endpoints the front end drives the engine
/// through. It handles:
/// - Workflow and app definitions with hot-reload
/// - Manual runs, run status and history
/// - Recurring schedules
/// - Backend model management

// Workflow, app, run and schedule endpoints
pub mod workflows;

// Model management and direct generation endpoints
pub mod models;

// Re-export router builders
pub use models::create_model_routes;
pub use workflows::{create_workflow_routes, AppState};
