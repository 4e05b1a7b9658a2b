/// Generation Backend Client
///
/// Talks to a local Ollama-compatible backend:
/// - Blocking generate with bounded, doubling-delay retries
/// - Streaming generate and model pulls over newline-delimited JSON
/// - Model listing, deletion and an availability probe

// Wire types shared by every endpoint
pub mod types;

// Line buffering, soft-fail parsing and whole-request restarts
pub mod stream;

// The HTTP client and the backend trait the executor depends on
pub mod ollama;

pub use ollama::{CompletionBackend, OllamaClient};
pub use stream::{collect_stream, LineDecoder, StreamEvent};
pub use types::{GenerateOptions, GenerateRequest, GenerateResponse, ModelInfo, PullProgress};
