/// promptchain server entry point
///
/// Loads configuration from the environment and starts the HTTP server with
/// workflow execution, scheduling and model management.

use promptchain::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Workflow runs, status, history and schedules at /api/workflows/*
/// - Model management at /api/models/*
/// - Health check at /healthz
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to 0.0.0.0:3004 and a backend at http://localhost:11434
    let config = Config::default();

    start_server(config).await
}
