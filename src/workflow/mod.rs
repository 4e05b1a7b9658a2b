/// Workflow Management Layer
///
/// This module handles workflow definitions and the in-memory repository the
/// engine reads from:
/// - Type definitions (Workflow, Node, AppConfig, run records)
/// - Catalog file loading
/// - Lock-free hot-reload registry using ArcSwap, plus run history

// Core workflow type definitions
pub mod types;

// JSON catalog loading
pub mod storage;

// Hot-reload registry using ArcSwap for zero-downtime updates
pub mod registry;

// Re-export commonly used types
pub use registry::WorkflowRegistry;
pub use storage::Catalog;
pub use types::{
    AppConfig, ExecutionStatus, Node, NodeExecution, NodeState, Workflow, WorkflowExecution,
};
