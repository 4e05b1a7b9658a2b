/// Core workflow type definitions
///
/// Defines workflows, their nodes, the app configurations nodes point at, and the
/// per-run records produced while executing them. Everything serializes to the
/// camelCase JSON shapes front ends already exchange.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// A named, strictly linear chain of nodes
///
/// Node order is given by `position`, which must cover `0..n-1` without gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Unique workflow identifier (e.g., "wf-summarize")
    pub id: String,
    /// Human-readable workflow name
    pub name: String,
    /// Nodes of this workflow
    pub nodes: Vec<Node>,
    /// Pinned workflows are listed first by front ends
    #[serde(default)]
    pub is_pinned: bool,
}

/// A single step of a workflow, pointing at an app configuration by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique node identifier within the workflow
    pub id: String,
    /// Name of the AppConfig this node runs
    pub app_name: String,
    /// Zero-based position in the chain
    pub position: usize,
}

/// Named bundle of model, prompt and sampling settings
///
/// Read-only to the engine; owned by whatever manages app definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub app_name: String,
    pub model: String,
    /// Name of the prompt template this app was built from
    pub prompt: String,
    pub default_temperature: f32,
    pub max_tokens: u32,
    pub use_system_prompt: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// Lifecycle of one node within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Pending,
    Running,
    Completed,
    Error,
}

/// Transient per-node status for a single run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStatus {
    pub node_id: String,
    #[serde(rename = "status")]
    pub state: NodeState,
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ExecutionStatus {
    pub fn pending(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            state: NodeState::Pending,
            retries: 0,
            error: None,
            output: None,
        }
    }
}

/// Input/output of one node inside a completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExecution {
    pub node_id: String,
    pub input: String,
    pub output: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Immutable record of a completed run, kept in history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub input: String,
    pub nodes: Vec<NodeExecution>,
    /// Milliseconds since the Unix epoch, taken when the run started
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_output: Option<String>,
}

impl WorkflowExecution {
    pub(crate) fn begin(input: &str) -> Self {
        Self {
            input: input.to_string(),
            nodes: Vec::new(),
            timestamp: now_millis(),
            final_output: None,
        }
    }
}

impl Workflow {
    /// Check that node ids are unique and positions are exactly `0..n-1`
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut seen_positions = vec![false; self.nodes.len()];
        let mut seen_ids = std::collections::HashSet::new();

        for node in &self.nodes {
            if !seen_ids.insert(node.id.as_str()) {
                return Err(EngineError::validation(format!(
                    "workflow '{}' has duplicate node id '{}'",
                    self.id, node.id
                )));
            }
            match seen_positions.get_mut(node.position) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(EngineError::validation(format!(
                        "workflow '{}' node '{}' has position {} outside 0..{} or shared with another node",
                        self.id,
                        node.id,
                        node.position,
                        self.nodes.len()
                    )))
                }
            }
        }

        Ok(())
    }

    /// Nodes sorted by position
    pub fn ordered_nodes(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes.iter().collect();
        nodes.sort_by_key(|node| node.position);
        nodes
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
