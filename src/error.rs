/// Engine error taxonomy
///
/// Client-level failures (timeouts, transport, malformed payloads) are kept apart
/// from engine-level failures (validation, exhausted node retries) so each layer
/// can decide what it is allowed to retry.

use std::time::Duration;

/// Failures raised by the generation backend client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Client-side deadline exceeded; the in-flight request was dropped
    #[error("request timed out after {after:?}")]
    Timeout { after: Duration },

    /// Network failure or non-success HTTP status
    #[error("transport error: {0}")]
    Transport(String),

    /// Response payload could not be decoded
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Terminal failure after the retry policy gave up
    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ClientError>,
    },
}

impl ClientError {
    /// Only deadline and transport failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transport(_))
    }

    pub(crate) fn status(status: reqwest::StatusCode, body: &str) -> Self {
        if body.is_empty() {
            Self::Transport(format!("HTTP error! status: {}", status.as_u16()))
        } else {
            Self::Transport(format!("HTTP error! status: {} ({})", status.as_u16(), body))
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Failures raised while executing workflows or arming schedules
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Bad schedule config, unresolved app reference, malformed workflow
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    /// A node failed on every attempt; fatal for the whole run
    #[error("node '{node_id}' failed after {retries} retries: {message}")]
    RetriesExhausted {
        node_id: String,
        retries: u32,
        message: String,
    },
}

impl EngineError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
