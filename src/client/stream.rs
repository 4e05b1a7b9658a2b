/// Newline-delimited JSON streaming
///
/// The backend streams one JSON object per line. Lines can arrive split across
/// reads, so bytes are buffered until a newline shows up; each complete line is
/// parsed on its own and a line that fails to parse is skipped without ending the
/// stream. A transport failure restarts the whole request, which the consumer
/// sees as a `StreamEvent::Restarted` item.

use crate::{client::types::GenerateResponse, error::ClientError};
use bytes::{Bytes, BytesMut};
use futures::{
    stream::{self, BoxStream},
    Stream, StreamExt,
};
use serde::de::DeserializeOwned;
use std::{collections::VecDeque, pin::Pin, time::Duration};

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// Item of a streamed reply
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent<T> {
    /// One parsed line, in wire order
    Item(T),
    /// The request was re-issued from scratch; everything received so far is void
    Restarted { attempt: u32, reason: String },
}

/// Splits incoming bytes into complete lines
///
/// Splitting happens on raw bytes: `\n` never occurs inside a multi-byte UTF-8
/// sequence, so a character broken across reads is reassembled before decoding.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
}

impl LineDecoder {
    /// Feed one read; returns every line completed by it, blank lines dropped
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line = self.buffer.split_to(newline + 1);
            let text = String::from_utf8_lossy(&line[..newline]);
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
        lines
    }

    /// Whatever is left once the body ends without a trailing newline
    pub fn finish(&mut self) -> Option<String> {
        let rest = self.buffer.split();
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

/// Everything needed to (re-)issue a streaming request
#[derive(Debug, Clone)]
pub(crate) struct StreamRequest {
    pub http: reqwest::Client,
    pub method: reqwest::Method,
    pub url: String,
    pub body: serde_json::Value,
    /// Deadline for getting the response headers
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl StreamRequest {
    async fn open(&self) -> Result<ByteStream, ClientError> {
        let send = self
            .http
            .request(self.method.clone(), &self.url)
            .json(&self.body)
            .send();

        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| ClientError::Timeout { after: self.timeout })??;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::status(status, &body));
        }

        Ok(Box::pin(response.bytes_stream()))
    }
}

struct StreamState<T> {
    request: StreamRequest,
    body: Option<ByteStream>,
    decoder: LineDecoder,
    pending: VecDeque<StreamEvent<T>>,
    /// Restarts used so far
    attempt: u32,
    finished: bool,
}

impl<T: DeserializeOwned> StreamState<T> {
    fn enqueue(&mut self, line: &str) {
        match serde_json::from_str::<T>(line) {
            Ok(item) => self.pending.push_back(StreamEvent::Item(item)),
            Err(e) => {
                tracing::warn!("⚠️ Skipping unparseable stream line from {}: {} ({})", self.request.url, e, line);
            }
        }
    }
}

/// Open a line-delimited JSON stream with whole-request restarts
pub(crate) fn ndjson_stream<T>(request: StreamRequest) -> BoxStream<'static, Result<StreamEvent<T>, ClientError>>
where
    T: DeserializeOwned + Send + 'static,
{
    let state = StreamState {
        request,
        body: None,
        decoder: LineDecoder::default(),
        pending: VecDeque::new(),
        attempt: 0,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.finished {
                return None;
            }

            let failure = if let Some(body) = state.body.as_mut() {
                match body.next().await {
                    Some(Ok(chunk)) => {
                        for line in state.decoder.push(&chunk) {
                            state.enqueue(&line);
                        }
                        continue;
                    }
                    Some(Err(e)) => ClientError::Transport(format!("stream read failed: {}", e)),
                    None => {
                        if let Some(rest) = state.decoder.finish() {
                            state.enqueue(&rest);
                        }
                        state.finished = true;
                        tracing::debug!("📭 Stream from {} completed", state.request.url);
                        continue;
                    }
                }
            } else {
                match state.request.open().await {
                    Ok(body) => {
                        state.body = Some(body);
                        continue;
                    }
                    Err(e) => e,
                }
            };

            if failure.is_retryable() && state.attempt < state.request.max_retries {
                state.attempt += 1;
                tracing::warn!(
                    "🔁 Retrying stream from {}... {} attempts remaining ({})",
                    state.request.url,
                    state.request.max_retries - state.attempt + 1,
                    failure
                );
                state.body = None;
                state.decoder = LineDecoder::default();
                tokio::time::sleep(state.request.retry_delay).await;
                state.pending.push_back(StreamEvent::Restarted {
                    attempt: state.attempt,
                    reason: failure.to_string(),
                });
                continue;
            }

            state.finished = true;
            state.body = None;
            let error = if failure.is_retryable() {
                ClientError::RetriesExhausted {
                    attempts: state.attempt + 1,
                    last: Box::new(failure),
                }
            } else {
                failure
            };
            tracing::error!("❌ Stream from {} failed: {}", state.request.url, error);
            return Some((Err(error), state));
        }
    })
    .boxed()
}

/// Drain a generate stream into the full reply text
///
/// `on_chunk` sees every fragment as it arrives. A restart discards the text
/// gathered so far; a fragment carrying a backend error ends the drain.
pub async fn collect_stream<S, F>(mut stream: S, mut on_chunk: F) -> Result<String, ClientError>
where
    S: Stream<Item = Result<StreamEvent<GenerateResponse>, ClientError>> + Unpin,
    F: FnMut(&GenerateResponse),
{
    let mut text = String::new();

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Item(chunk) => {
                if let Some(error) = &chunk.error {
                    return Err(ClientError::Protocol(format!("backend reported: {}", error)));
                }
                text.push_str(&chunk.response);
                on_chunk(&chunk);
            }
            StreamEvent::Restarted { attempt, .. } => {
                tracing::debug!("♻️ Discarding {} bytes of partial output (restart {})", text.len(), attempt);
                text.clear();
            }
        }
    }

    Ok(text)
}
