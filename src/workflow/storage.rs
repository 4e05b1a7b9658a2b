/// Catalog file loading
///
/// App and workflow definitions are authored elsewhere; the engine only reads a
/// JSON snapshot of them at start-up. Without a file, the built-in apps are used.

use crate::workflow::types::{AppConfig, Workflow};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Snapshot of app and workflow definitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub apps: Vec<AppConfig>,
    #[serde(default)]
    pub workflows: Vec<Workflow>,
}

impl Catalog {
    /// Read and validate a catalog from a JSON file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("📥 Loading catalog from {}", path.display());

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        let catalog: Catalog = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse catalog file {}", path.display()))?;

        for workflow in &catalog.workflows {
            workflow
                .validate()
                .map_err(|e| anyhow::anyhow!("Invalid workflow in catalog: {}", e))?;
        }

        Ok(catalog)
    }
}

impl Default for Catalog {
    /// Built-in apps shipped with the desktop front end
    fn default() -> Self {
        Self {
            apps: vec![
                AppConfig {
                    app_name: "Code Helper".to_string(),
                    model: "deepseek-coder:6.7b".to_string(),
                    prompt: "code_assistant".to_string(),
                    default_temperature: 0.7,
                    max_tokens: 1024,
                    use_system_prompt: true,
                    system_prompt: Some("You are a professional coding assistant.".to_string()),
                },
                AppConfig {
                    app_name: "Writing Helper".to_string(),
                    model: "llama2:7b".to_string(),
                    prompt: "writing_assistant".to_string(),
                    default_temperature: 0.8,
                    max_tokens: 2048,
                    use_system_prompt: true,
                    system_prompt: Some("You are a professional writing assistant.".to_string()),
                },
            ],
            workflows: Vec::new(),
        }
    }
}
