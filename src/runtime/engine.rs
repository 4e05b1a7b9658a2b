/// Linear workflow orchestration
///
/// Runs a workflow's nodes one after another in position order, feeding each
/// node's output to the next. Only runs that complete every node are recorded in
/// history. At most one run per workflow is in flight; extra requests are dropped.

use crate::{
    error::EngineError,
    runtime::{executor::NodeExecutor, status::StatusSink},
    workflow::{
        registry::WorkflowRegistry,
        types::{now_millis, ExecutionStatus, NodeExecution, Workflow, WorkflowExecution},
    },
};
use dashmap::DashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Result of asking for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every node completed; the record is already in history
    Completed(WorkflowExecution),
    /// Another run of the same workflow was in flight; nothing happened
    AlreadyRunning,
}

/// Workflow executor with per-workflow single-flight
pub struct WorkflowExecutor {
    /// Node executor for handling individual node execution
    executor: Arc<NodeExecutor>,
    registry: Arc<WorkflowRegistry>,
    sink: Arc<dyn StatusSink>,
    /// Ids of workflows with a run in flight
    executing: DashSet<String>,
}

/// Clears the in-flight flag however the run ends, including cancellation
struct ExecutingGuard<'a> {
    executing: &'a DashSet<String>,
    workflow_id: &'a str,
}

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        self.executing.remove(self.workflow_id);
    }
}

impl WorkflowExecutor {
    pub fn new(executor: Arc<NodeExecutor>, registry: Arc<WorkflowRegistry>, sink: Arc<dyn StatusSink>) -> Self {
        Self {
            executor,
            registry,
            sink,
            executing: DashSet::new(),
        }
    }

    pub fn registry(&self) -> &Arc<WorkflowRegistry> {
        &self.registry
    }

    pub fn is_executing(&self, workflow_id: &str) -> bool {
        self.executing.contains(workflow_id)
    }

    /// Look the workflow up in the registry, then run it
    pub async fn execute_workflow_by_id(&self, workflow_id: &str, input: &str) -> Result<RunOutcome, EngineError> {
        let workflow = self
            .registry
            .get_workflow(workflow_id)
            .ok_or_else(|| EngineError::validation(format!("Workflow not found: {}", workflow_id)))?;
        self.execute_workflow(&workflow, input).await
    }

    /// Run every node of `workflow` in order, starting from `input`
    ///
    /// A node failure aborts the run and is returned; nothing is added to
    /// history in that case.
    pub async fn execute_workflow(&self, workflow: &Workflow, input: &str) -> Result<RunOutcome, EngineError> {
        workflow.validate()?;

        if !self.executing.insert(workflow.id.clone()) {
            tracing::debug!("⏭️ Workflow {} is already executing - ignoring request", workflow.id);
            return Ok(RunOutcome::AlreadyRunning);
        }
        let _guard = ExecutingGuard {
            executing: &self.executing,
            workflow_id: &workflow.id,
        };

        // a registered workflow deleted mid-run must not get its history back
        let registered = self.registry.get_workflow(&workflow.id).is_some();
        let run_id = Uuid::new_v4();
        let workflow_start_time = std::time::Instant::now();
        let nodes = workflow.ordered_nodes();

        tracing::info!("🚀 Starting workflow execution: {} (run {}, {} nodes)", workflow.id, run_id, nodes.len());

        let mut statuses: Vec<ExecutionStatus> = nodes.iter().map(|node| ExecutionStatus::pending(&node.id)).collect();
        self.sink.run_started(&workflow.id, &statuses);

        let mut execution = WorkflowExecution::begin(input);
        let mut current = input.to_string();

        for (step_num, (node, status)) in nodes.iter().zip(statuses.iter_mut()).enumerate() {
            tracing::info!(
                "📍 Step {}/{}: Executing node '{}' (app: {})",
                step_num + 1,
                nodes.len(),
                node.id,
                node.app_name
            );

            let output = match self.executor.execute_node(&workflow.id, node, &current, status).await {
                Ok(output) => output,
                Err(e) => {
                    tracing::error!(
                        "❌ Workflow '{}' aborted at node '{}' (run {}): {}",
                        workflow.id,
                        node.id,
                        run_id,
                        e
                    );
                    return Err(e);
                }
            };

            execution.nodes.push(NodeExecution {
                node_id: node.id.clone(),
                input: current,
                output: output.clone(),
                timestamp: now_millis(),
            });
            current = output;
        }

        execution.final_output = Some(current);
        if registered && self.registry.get_workflow(&workflow.id).is_none() {
            tracing::warn!("⚠️ Workflow {} was removed during run {} - not recording history", workflow.id, run_id);
        } else {
            self.registry.record_execution(&workflow.id, execution.clone());
        }
        self.sink.run_completed(&workflow.id, &execution);

        tracing::info!(
            "🎉 Workflow '{}' execution completed successfully in {:?} (run {})",
            workflow.id,
            workflow_start_time.elapsed(),
            run_id
        );

        Ok(RunOutcome::Completed(execution))
    }
}
