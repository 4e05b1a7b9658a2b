/// Single-node execution with node-level retry
///
/// Resolves the node's app configuration, builds the generate request from it and
/// calls the backend. Any failure is retried as a full re-request after a fixed
/// delay, up to `max_retries` times; every state change is published.

use crate::{
    client::{CompletionBackend, GenerateOptions, GenerateRequest},
    config::ExecutorConfig,
    error::{ClientError, EngineError},
    runtime::status::StatusSink,
    workflow::{
        registry::WorkflowRegistry,
        types::{AppConfig, ExecutionStatus, Node, NodeState},
    },
};
use std::sync::Arc;

/// Marker shown on a node between a failed attempt and its retry
pub const RETRYING_MARKER: &str = "Retrying...";

/// Executes one workflow node: `pending → running → {completed | error}`
pub struct NodeExecutor {
    backend: Arc<dyn CompletionBackend>,
    registry: Arc<WorkflowRegistry>,
    sink: Arc<dyn StatusSink>,
    config: ExecutorConfig,
}

impl std::fmt::Debug for NodeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeExecutor").field("config", &self.config).finish_non_exhaustive()
    }
}

impl NodeExecutor {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        registry: Arc<WorkflowRegistry>,
        sink: Arc<dyn StatusSink>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            backend,
            registry,
            sink,
            config,
        }
    }

    /// Build the generate request a node sends for `input`
    pub fn build_request(app: &AppConfig, input: &str) -> GenerateRequest {
        GenerateRequest {
            model: app.model.clone(),
            prompt: input.to_string(),
            system: if app.use_system_prompt {
                app.system_prompt.clone()
            } else {
                None
            },
            options: GenerateOptions {
                temperature: Some(app.default_temperature),
                num_predict: Some(app.max_tokens),
                ..GenerateOptions::default()
            },
            ..GenerateRequest::default()
        }
    }

    /// Run `node` on `input`, updating `status` in place
    ///
    /// Makes at most `max_retries + 1` backend calls. An unknown app is fatal on
    /// the spot; exhausting the retries yields `EngineError::RetriesExhausted`.
    pub async fn execute_node(
        &self,
        workflow_id: &str,
        node: &Node,
        input: &str,
        status: &mut ExecutionStatus,
    ) -> Result<String, EngineError> {
        tracing::info!("🚀 Starting node execution: {} (app: {})", node.id, node.app_name);
        tracing::debug!("📥 Input: {} chars", input.len());

        let Some(app) = self.registry.get_app(&node.app_name) else {
            let message = format!("App {} not found", node.app_name);
            tracing::error!("❌ Node {} cannot run: {}", node.id, message);
            status.state = NodeState::Error;
            status.error = Some(message.clone());
            self.sink.node_updated(workflow_id, status);
            return Err(EngineError::Validation(message));
        };

        let mut attempt = 0;
        loop {
            status.state = NodeState::Running;
            self.sink.node_updated(workflow_id, status);

            let start_time = std::time::Instant::now();
            let request = Self::build_request(&app, input);

            let failure = match self.backend.generate(request).await {
                Ok(reply) => match reply.error {
                    Some(error) => ClientError::Protocol(format!("backend reported: {}", error)),
                    None => {
                        tracing::info!("✅ Node execution completed: {} in {:?}", node.id, start_time.elapsed());
                        status.state = NodeState::Completed;
                        status.retries = attempt;
                        status.error = None;
                        status.output = Some(reply.response.clone());
                        self.sink.node_updated(workflow_id, status);
                        return Ok(reply.response);
                    }
                },
                Err(e) => e,
            };

            if attempt < self.config.max_retries {
                tracing::warn!(
                    "⚠️ Node {} attempt {} failed in {:?}: {} - retrying in {:?}",
                    node.id,
                    attempt + 1,
                    start_time.elapsed(),
                    failure,
                    self.config.retry_delay()
                );
                status.state = NodeState::Error;
                status.retries = attempt;
                status.error = Some(RETRYING_MARKER.to_string());
                self.sink.node_updated(workflow_id, status);

                tokio::time::sleep(self.config.retry_delay()).await;
                attempt += 1;
                continue;
            }

            tracing::error!("❌ Node execution failed: {} after {} retries - Error: {}", node.id, attempt, failure);
            status.state = NodeState::Error;
            status.retries = attempt;
            status.error = Some(failure.to_string());
            self.sink.node_updated(workflow_id, status);

            return Err(EngineError::RetriesExhausted {
                node_id: node.id.clone(),
                retries: attempt,
                message: failure.to_string(),
            });
        }
    }
}
