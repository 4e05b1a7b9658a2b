//! Fixtures shared by the runtime tests

use crate::{
    client::{CompletionBackend, GenerateRequest, GenerateResponse},
    error::ClientError,
    workflow::{
        registry::WorkflowRegistry,
        types::{AppConfig, Node, Workflow},
    },
};
use async_trait::async_trait;
use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

type Handler = dyn Fn(u32, &GenerateRequest) -> Result<GenerateResponse, ClientError> + Send + Sync;

/// Backend answering from a closure, counting calls
pub(crate) struct FnBackend {
    handler: Box<Handler>,
    calls: AtomicU32,
    latency: Option<Duration>,
}

impl FnBackend {
    /// Reply text computed from the request
    pub fn new(f: impl Fn(&GenerateRequest) -> Result<String, ClientError> + Send + Sync + 'static) -> Self {
        Self::sequenced(move |_, request| f(request))
    }

    /// Reply text computed from the zero-based call number and the request
    pub fn sequenced(f: impl Fn(u32, &GenerateRequest) -> Result<String, ClientError> + Send + Sync + 'static) -> Self {
        Self::raw(move |call, request| {
            f(call, request).map(|text| GenerateResponse {
                model: request.model.clone(),
                response: text,
                done: true,
                ..Default::default()
            })
        })
    }

    pub fn raw(
        f: impl Fn(u32, &GenerateRequest) -> Result<GenerateResponse, ClientError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(f),
            calls: AtomicU32::new(0),
            latency: None,
        }
    }

    /// Sleep before every reply so callers are suspended mid-node
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for FnBackend {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ClientError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        (self.handler)(call, &request)
    }
}

pub(crate) fn failing(_: &GenerateRequest) -> Result<String, ClientError> {
    Err(ClientError::Transport("backend down".into()))
}

/// Test double behaviour keyed on the app's model: "Upper" shouts, "Bang" appends "!"
pub(crate) fn by_model(request: &GenerateRequest) -> Result<String, ClientError> {
    match request.model.as_str() {
        "Upper-model" => Ok(request.prompt.to_uppercase()),
        "Bang-model" => Ok(format!("{}!", request.prompt)),
        _ => Err(ClientError::Transport(format!("no such model {}", request.model))),
    }
}

pub(crate) fn app(name: &str) -> AppConfig {
    AppConfig {
        app_name: name.to_string(),
        model: format!("{}-model", name),
        prompt: "default".to_string(),
        default_temperature: 0.7,
        max_tokens: 256,
        use_system_prompt: true,
        system_prompt: None,
    }
}

pub(crate) fn node(id: &str, app_name: &str, position: usize) -> Node {
    Node {
        id: id.to_string(),
        app_name: app_name.to_string(),
        position,
    }
}

pub(crate) fn registry_with(apps: &[&str]) -> Arc<WorkflowRegistry> {
    let registry = WorkflowRegistry::new();
    for name in apps {
        registry.upsert_app(app(name));
    }
    Arc::new(registry)
}

/// Workflow `id` whose nodes run `apps` in order
pub(crate) fn workflow(id: &str, apps: &[&str]) -> Workflow {
    Workflow {
        id: id.to_string(),
        name: format!("Workflow {}", id),
        nodes: apps
            .iter()
            .enumerate()
            .map(|(position, app_name)| node(&format!("n{}", position), app_name, position))
            .collect(),
        is_pinned: false,
    }
}
