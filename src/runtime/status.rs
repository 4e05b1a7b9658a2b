/// Status publication for display
///
/// The executor owns each run's status list and pushes snapshots out through a
/// `StatusSink`. `StatusBoard` keeps the latest snapshot per workflow for the API.

use crate::workflow::types::{ExecutionStatus, WorkflowExecution};
use dashmap::DashMap;
use serde::Serialize;

/// Receives run progress; every method defaults to doing nothing
pub trait StatusSink: Send + Sync {
    /// A run started; all nodes are `pending`
    fn run_started(&self, _workflow_id: &str, _statuses: &[ExecutionStatus]) {}

    /// One node changed state
    fn node_updated(&self, _workflow_id: &str, _status: &ExecutionStatus) {}

    /// A run completed every node
    fn run_completed(&self, _workflow_id: &str, _execution: &WorkflowExecution) {}
}

/// Sink that drops every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl StatusSink for NoopSink {}

/// Latest run state of one workflow
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub statuses: Vec<ExecutionStatus>,
    /// Set only when the latest run completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_output: Option<String>,
}

/// In-memory sink keyed by workflow id
#[derive(Debug, Default)]
pub struct StatusBoard {
    runs: DashMap<String, RunSnapshot>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, workflow_id: &str) -> Option<RunSnapshot> {
        self.runs.get(workflow_id).map(|entry| entry.value().clone())
    }
}

impl StatusSink for StatusBoard {
    fn run_started(&self, workflow_id: &str, statuses: &[ExecutionStatus]) {
        self.runs.insert(
            workflow_id.to_string(),
            RunSnapshot {
                statuses: statuses.to_vec(),
                final_output: None,
            },
        );
    }

    fn node_updated(&self, workflow_id: &str, status: &ExecutionStatus) {
        let mut run = self.runs.entry(workflow_id.to_string()).or_default();
        match run.statuses.iter_mut().find(|s| s.node_id == status.node_id) {
            Some(slot) => *slot = status.clone(),
            None => run.statuses.push(status.clone()),
        }
    }

    fn run_completed(&self, workflow_id: &str, execution: &WorkflowExecution) {
        let mut run = self.runs.entry(workflow_id.to_string()).or_default();
        run.final_output = execution.final_output.clone();
    }
}
