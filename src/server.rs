/// Server setup and initialization
///
/// Wires together all components: backend client, registry, status board,
/// executors, scheduler and HTTP routes. Provides the main application factory
/// function for creating the Axum app.

use crate::{
    api::{create_model_routes, create_workflow_routes, AppState},
    client::{CompletionBackend, OllamaClient},
    config::Config,
    runtime::{
        engine::WorkflowExecutor, executor::NodeExecutor, scheduler::Scheduler, status::StatusBoard,
        status::StatusSink,
    },
    workflow::{registry::WorkflowRegistry, storage::Catalog},
};
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Create the main Axum application with all routes
///
/// Returns the router together with its state so the caller can shut the
/// scheduler down when the server stops.
pub async fn create_app(config: Config) -> Result<(Router, AppState)> {
    // Seed the registry from the catalog file, or fall back to the built-in apps
    let catalog = match &config.catalog.path {
        Some(path) => Catalog::load_from_file(path).with_context(|| format!("Failed to load catalog {}", path))?,
        None => {
            tracing::info!("📋 No catalog configured, using built-in apps");
            Catalog::default()
        }
    };
    let registry = Arc::new(WorkflowRegistry::from_catalog(catalog));

    tracing::info!("🔌 Connecting generation backend at {}", config.backend.base_url);
    let client = OllamaClient::new(config.backend.clone());
    if !client.check_available().await {
        tracing::warn!("⚠️ Generation backend not reachable at {} - runs will fail until it is", config.backend.base_url);
    }

    tracing::info!("⚙️ Initializing node executor");
    let board = Arc::new(StatusBoard::new());
    let sink: Arc<dyn StatusSink> = board.clone();
    let backend: Arc<dyn CompletionBackend> = Arc::new(client.clone());
    let node_executor = Arc::new(NodeExecutor::new(
        backend,
        Arc::clone(&registry),
        Arc::clone(&sink),
        config.executor.clone(),
    ));

    tracing::info!("🚀 Initializing workflow executor");
    let engine = Arc::new(WorkflowExecutor::new(node_executor, Arc::clone(&registry), sink));

    tracing::info!("⏰ Initializing scheduler");
    let scheduler = Arc::new(Scheduler::new(Arc::clone(&engine)));

    let app_state = AppState {
        registry,
        engine,
        scheduler,
        board,
        client,
    };

    tracing::info!("📡 Creating HTTP router with all endpoints");
    let app = Router::new()
        .route("/healthz", get(health_check))
        .merge(create_workflow_routes().with_state(app_state.clone()))
        .merge(create_model_routes().with_state(app_state.clone()));

    tracing::info!("✅ Application initialized successfully");

    Ok((app, app_state))
}

/// Start the HTTP server with the given configuration
///
/// Creates the application and serves it until Ctrl-C, then disarms every
/// schedule.
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting promptchain server...");

    let (app, state) = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    state.scheduler.shutdown();
    tracing::info!("👋 Server stopped");

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
