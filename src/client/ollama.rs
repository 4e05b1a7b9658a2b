/// HTTP client for the local generation backend
///
/// Every call carries its own deadline. Blocking calls are retried with a doubling
/// delay on timeout and transport failures; malformed replies fail immediately.
/// Streaming calls restart the whole request instead (see `client::stream`).

use crate::{
    client::{
        stream::{ndjson_stream, StreamEvent, StreamRequest},
        types::{GenerateRequest, GenerateResponse, ModelInfo, ModelList, ModelName, PullProgress},
    },
    config::BackendConfig,
    error::ClientError,
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use std::{future::Future, time::Duration};

/// Anything that can turn a generate request into a complete reply
///
/// The node executor depends on this rather than on the HTTP client directly.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ClientError>;
}

/// Client for an Ollama-compatible backend
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    config: BackendConfig,
}

impl OllamaClient {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Blocking generate: one JSON reply with the full text
    pub async fn generate_completion(&self, request: &GenerateRequest) -> Result<GenerateResponse, ClientError> {
        let body = &request.streaming(false);
        let url = &self.url("/api/generate");
        let this = self;

        tracing::debug!("🧠 Generating with model {} ({} prompt chars)", request.model, request.prompt.len());

        self.with_retry("generate", move || async move {
            this.with_deadline(this.config.timeout(), async {
                let response = this.http.post(url).json(body).send().await?;
                this.decode_json::<GenerateResponse>(response).await
            })
            .await
        })
        .await
    }

    /// Streaming generate: fragments in wire order, restarts announced inline
    pub fn generate_completion_stream(
        &self,
        request: &GenerateRequest,
    ) -> BoxStream<'static, Result<StreamEvent<GenerateResponse>, ClientError>> {
        let body = serde_json::to_value(request.streaming(true)).unwrap_or_default();
        ndjson_stream(self.stream_request(reqwest::Method::POST, "/api/generate", body, self.config.timeout()))
    }

    /// Pull a model; yields progress lines until the backend closes the stream
    pub fn pull_model(&self, model_name: &str) -> BoxStream<'static, Result<StreamEvent<PullProgress>, ClientError>> {
        tracing::info!("📦 Pulling model {}", model_name);
        let body = serde_json::json!({ "name": model_name });
        ndjson_stream(self.stream_request(reqwest::Method::POST, "/api/pull", body, self.config.pull_timeout()))
    }

    /// Models installed on the backend
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ClientError> {
        let url = &self.url("/api/tags");
        let this = self;

        let list = self
            .with_retry("list models", move || async move {
                this.with_deadline(this.config.timeout(), async {
                    let response = this.http.get(url).send().await?;
                    this.decode_json::<ModelList>(response).await
                })
                .await
            })
            .await?;

        Ok(list.models)
    }

    pub async fn delete_model(&self, model_name: &str) -> Result<(), ClientError> {
        let url = &self.url("/api/delete");
        let body = &ModelName { name: model_name };
        let this = self;

        tracing::info!("🗑️ Deleting model {}", model_name);

        self.with_retry("delete model", move || async move {
            this.with_deadline(this.config.timeout(), async {
                let response = this.http.delete(url).json(body).send().await?;
                let status = response.status();
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(ClientError::status(status, &text));
                }
                Ok(())
            })
            .await
        })
        .await
    }

    /// Short-deadline probe; any failure reads as "unavailable"
    pub async fn check_available(&self) -> bool {
        let probe = self.http.get(self.url("/api/tags")).send();
        match tokio::time::timeout(self.config.probe_timeout(), probe).await {
            Ok(Ok(response)) => response.status().is_success(),
            Ok(Err(e)) => {
                tracing::debug!("🔌 Backend probe failed: {}", e);
                false
            }
            Err(_) => {
                tracing::debug!("⏱️ Backend probe timed out after {:?}", self.config.probe_timeout());
                false
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn stream_request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> StreamRequest {
        StreamRequest {
            http: self.http.clone(),
            method,
            url: self.url(path),
            body,
            timeout,
            max_retries: self.config.max_retries,
            retry_delay: self.config.retry_delay(),
        }
    }

    async fn decode_json<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::status(status, &text));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Protocol(format!("invalid response body: {}", e)))
    }

    /// Abort `operation` once `deadline` passes
    async fn with_deadline<T>(
        &self,
        deadline: Duration,
        operation: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        tokio::time::timeout(deadline, operation)
            .await
            .map_err(|_| ClientError::Timeout { after: deadline })?
    }

    /// Bounded retry loop with doubling delay for retryable failures
    async fn with_retry<T, F, Fut>(&self, operation: &str, mut attempt_once: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut delay = self.config.retry_delay();
        let mut retries = 0;

        loop {
            match attempt_once().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retries < self.config.max_retries => {
                    retries += 1;
                    tracing::warn!(
                        "🔁 {} failed ({}), retry {}/{} in {:?}",
                        operation,
                        e,
                        retries,
                        self.config.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(e) if e.is_retryable() => {
                    tracing::error!("❌ {} failed after {} attempts: {}", operation, retries + 1, e);
                    return Err(ClientError::RetriesExhausted {
                        attempts: retries + 1,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    tracing::error!("❌ {} failed: {}", operation, e);
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl CompletionBackend for OllamaClient {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ClientError> {
        self.generate_completion(&request).await
    }
}
