//! Completion-server client for Verdant
//!
//! This crate talks to a local OpenAI-compatible model server (LM Studio and
//! friends) for model listing and chat completions, including the streaming
//! decode path and its throughput metrics.

mod client;
mod metrics;
mod models;
mod stream;

pub use client::{ChatClient, ChunkStream};
pub use metrics::{
    MetricsTracker, StreamMetrics, STOP_REASON_CANCELLED, STOP_REASON_EOS, STOP_REASON_UNKNOWN,
};
pub use models::{
    display_name, is_embedding_model, is_vision_model, model_kind, ChatChoice, ChatMessage,
    ChatRequest, ChatResponse, ContentPart, ImageUrl, MessageContent, Model, ModelKind,
    ModelsResponse, Role, SamplingParameters, Usage,
};
pub use stream::StreamChunk;

/// Default local completion server URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:1234";

/// Error types for completion-server operations
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Completion server is not responding. Start your local server and check the URL.")]
    ConnectionError,

    #[error("Server returned error: {0}")]
    ServerError(String),

    #[error("Request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    StreamError(String),
}

/// Result type for completion-server operations
pub type Result<T> = std::result::Result<T, ApiError>;
