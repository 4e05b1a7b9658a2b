/// Configuration management for the promptchain engine
///
/// Handles server binding, generation backend connection, retry policies and the
/// optional catalog file the registry is seeded from.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Generation backend client configuration
    pub backend: BackendConfig,
    /// Node retry policy
    pub executor: ExecutorConfig,
    /// Catalog seeding
    pub catalog: CatalogConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Generation backend connection and transport retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend (e.g., "http://localhost:11434")
    pub base_url: String,
    /// Deadline for a single request; pulls get twice this
    pub timeout_ms: u64,
    /// Deadline for the availability probe
    pub probe_timeout_ms: u64,
    /// Retries after the first attempt for transport/timeout failures
    pub max_retries: u32,
    /// Base delay between transport retries (doubles for blocking calls)
    pub retry_delay_ms: u64,
}

/// Node-level retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Retries after the first attempt before a node is declared failed
    pub max_retries: u32,
    /// Fixed delay between node attempts
    pub retry_delay_ms: u64,
}

/// Catalog seeding configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Optional JSON file with `{ "apps": [...], "workflows": [...] }`
    pub path: Option<String>,
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Model pulls transfer gigabytes; they get twice the regular deadline
    pub fn pull_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.saturating_mul(2))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            timeout_ms: 30_000,
            probe_timeout_ms: 5_000,
            max_retries: 3,
            retry_delay_ms: 1_000,
        }
    }
}

impl ExecutorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 3_000,
        }
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("PROMPTCHAIN_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("PROMPTCHAIN_PORT")
                    .unwrap_or_else(|_| "3004".to_string())
                    .parse()
                    .unwrap_or(3004),
            },
            backend: BackendConfig {
                base_url: std::env::var("PROMPTCHAIN_BACKEND_URL")
                    .unwrap_or_else(|_| "http://localhost:11434".to_string()),
                ..BackendConfig::default()
            },
            executor: ExecutorConfig::default(),
            catalog: CatalogConfig {
                path: std::env::var("PROMPTCHAIN_CATALOG").ok(),
            },
        }
    }
}
