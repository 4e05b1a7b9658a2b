/// Hot-reload workflow registry using ArcSwap
///
/// Holds the app configurations and workflow definitions the engine reads, plus
/// the history of completed runs. Definition updates swap the whole map pointer so
/// runs in flight keep reading the snapshot they started with.

use crate::workflow::{
    storage::Catalog,
    types::{AppConfig, Workflow, WorkflowExecution},
};
use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::{collections::HashMap, sync::Arc};

/// Repository injected into the workflow executor and the API layer
#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    /// Key: app_name
    apps: ArcSwap<HashMap<String, AppConfig>>,
    /// Key: workflow_id
    workflows: ArcSwap<HashMap<String, Workflow>>,
    /// Key: workflow_id, most recent run first
    history: DashMap<String, Vec<WorkflowExecution>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry pre-populated from a catalog
    pub fn from_catalog(catalog: Catalog) -> Self {
        let registry = Self::new();
        registry.load_catalog(catalog);
        registry
    }

    /// Replace apps and workflows with the catalog contents in two atomic swaps
    pub fn load_catalog(&self, catalog: Catalog) {
        let apps: HashMap<String, AppConfig> = catalog
            .apps
            .into_iter()
            .map(|app| (app.app_name.clone(), app))
            .collect();
        let workflows: HashMap<String, Workflow> = catalog
            .workflows
            .into_iter()
            .map(|wf| (wf.id.clone(), wf))
            .collect();

        tracing::info!("📊 Loaded catalog with {} apps and {} workflows", apps.len(), workflows.len());

        self.apps.store(Arc::new(apps));
        self.workflows.store(Arc::new(workflows));
    }

    /// Resolve an app configuration by name (lock-free read)
    pub fn get_app(&self, app_name: &str) -> Option<AppConfig> {
        self.apps.load().get(app_name).cloned()
    }

    /// All app configurations, sorted by name
    pub fn list_apps(&self) -> Vec<AppConfig> {
        let mut apps: Vec<AppConfig> = self.apps.load().values().cloned().collect();
        apps.sort_by(|a, b| a.app_name.cmp(&b.app_name));
        apps
    }

    /// Add or replace an app configuration
    pub fn upsert_app(&self, app: AppConfig) {
        self.apps.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(app.app_name.clone(), app.clone());
            next
        });
    }

    /// Get a workflow by ID (lock-free read)
    pub fn get_workflow(&self, workflow_id: &str) -> Option<Workflow> {
        self.workflows.load().get(workflow_id).cloned()
    }

    /// All workflows, pinned ones first, then by name
    pub fn list_workflows(&self) -> Vec<Workflow> {
        let mut workflows: Vec<Workflow> = self.workflows.load().values().cloned().collect();
        workflows.sort_by(|a, b| b.is_pinned.cmp(&a.is_pinned).then_with(|| a.name.cmp(&b.name)));
        workflows
    }

    /// Add or replace a workflow definition
    pub fn upsert_workflow(&self, workflow: Workflow) {
        tracing::info!("Hot-reloaded workflow: {}", workflow.id);
        self.workflows.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(workflow.id.clone(), workflow.clone());
            next
        });
    }

    /// Remove a workflow and its history
    pub fn remove_workflow(&self, workflow_id: &str) -> bool {
        let mut removed = false;
        self.workflows.rcu(|current| {
            let mut next = (**current).clone();
            removed = next.remove(workflow_id).is_some();
            next
        });
        self.history.remove(workflow_id);

        if removed {
            tracing::info!("Removed workflow from registry: {}", workflow_id);
        }
        removed
    }

    /// Prepend a completed run to the workflow's history
    pub fn record_execution(&self, workflow_id: &str, execution: WorkflowExecution) {
        self.history
            .entry(workflow_id.to_string())
            .or_default()
            .insert(0, execution);
    }

    /// Completed runs, most recent first
    pub fn history(&self, workflow_id: &str) -> Vec<WorkflowExecution> {
        self.history
            .get(workflow_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn history_len(&self, workflow_id: &str) -> usize {
        self.history.get(workflow_id).map(|entry| entry.len()).unwrap_or(0)
    }
}
