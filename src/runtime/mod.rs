/// Runtime Execution Engine
///
/// This module runs workflows against the completion backend.
/// It handles:
/// - Single-node execution with node-level retry
/// - Sequential chaining of nodes in position order
/// - Status publication and execution history
/// - Recurring schedules built on cancellable tokio tasks

// Sequential chain execution with the single-flight guard
pub mod engine;

// Individual node execution with retry
pub mod executor;

// Schedule configs and next-fire computation
pub mod schedule;

// Background task that re-arms recurring runs
pub mod scheduler;

// Status sinks and the in-memory status board
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types
pub use engine::{RunOutcome, WorkflowExecutor};
pub use executor::{NodeExecutor, RETRYING_MARKER};
pub use schedule::{compute_next_fire_time, Schedule, ScheduleConfig, ScheduleType};
pub use scheduler::{ScheduleInfo, Scheduler};
pub use status::{NoopSink, RunSnapshot, StatusBoard, StatusSink};
