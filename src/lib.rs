/// promptchain: chain local text-generation apps into scheduled workflows
///
/// This library provides the workflow engine: a backend client with retries and
/// streaming, sequential node execution with node-level retry, run history, and
/// recurring schedules.

// Core configuration and setup
pub mod config;

// Error taxonomy shared by the client and the engine
pub mod error;

// Generation backend client - blocking, streaming and model management calls
pub mod client;

// Workflow management layer - definitions, catalog loading, registry and history
pub mod workflow;

// Runtime execution engine - node retry, sequential chains, status and scheduling
pub mod runtime;

// HTTP API layer - REST endpoints for runs, schedules and models
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use client::{CompletionBackend, OllamaClient};
pub use error::{ClientError, EngineError};
pub use runtime::{compute_next_fire_time, NodeExecutor, RunOutcome, Scheduler, WorkflowExecutor};
pub use server::start_server;
pub use workflow::{AppConfig, Node, Workflow, WorkflowExecution, WorkflowRegistry};
