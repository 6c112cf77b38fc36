//! Wire types for the OpenAI-compatible completion API

use serde::{Deserialize, Serialize};

/// Model information returned by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Model identifier
    pub id: String,
    /// Object type (usually "model")
    #[serde(default)]
    pub object: String,
    /// Owner/creator of the model
    #[serde(default)]
    pub owned_by: String,
    /// Creation timestamp
    #[serde(default)]
    pub created: i64,
}

/// Models list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    /// Object type
    #[serde(default)]
    pub object: String,
    /// List of models
    pub data: Vec<Model>,
}

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Content of a message: plain text or an ordered part sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content
    Text(String),
    /// Multi-part content (text and images)
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Get the first text fragment of the content, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Parts(parts) => parts.iter().find_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ImageUrl { .. } => None,
            }),
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Part of a multi-part message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content
    Text { text: String },
    /// Image reference (a self-contained data URI in this system's usage)
    ImageUrl { image_url: ImageUrl },
}

/// Image URL wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Chat message for completions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message author
    pub role: Role,
    /// Message content
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn new(role: Role, content: MessageContent) -> Self {
        Self { role, content }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, MessageContent::Text(content.into()))
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, MessageContent::Text(content.into()))
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageContent::Text(content.into()))
    }
}

/// User-tunable sampling parameters, sent with every completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParameters {
    /// Sampling temperature (0.0 to 2.0)
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Top-p sampling (0.0 to 1.0)
    pub top_p: f32,
    /// Top-k sampling
    pub top_k: u32,
    /// Repeat penalty
    pub repeat_penalty: f32,
    /// System prompt prepended to the conversation when non-blank
    pub system_prompt: String,
}

impl Default for SamplingParameters {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            top_p: 0.9,
            top_k: 40,
            repeat_penalty: 1.1,
            system_prompt: String::new(),
        }
    }
}

/// Chat completion request body
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model to use for completion
    pub model: String,
    /// Messages in the conversation
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f32>,
    /// Whether to stream the response
    pub stream: bool,
}

impl ChatRequest {
    /// Create a new chat request
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            top_p: None,
            top_k: None,
            repeat_penalty: None,
            stream: false,
        }
    }

    /// Carry the configured sampling parameters on the request
    pub fn with_parameters(mut self, params: &SamplingParameters) -> Self {
        self.temperature = Some(params.temperature);
        self.max_tokens = Some(params.max_tokens);
        self.top_p = Some(params.top_p);
        self.top_k = Some(params.top_k);
        self.repeat_penalty = Some(params.repeat_penalty);
        self
    }

    /// Enable or disable streaming
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Choice in a chat completion response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    /// Index of this choice
    #[serde(default)]
    pub index: usize,
    /// The message generated
    pub message: ChatMessage,
    /// Reason for finishing (stop, length, etc.)
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Usage statistics for a completion
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,
    /// Tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
}

/// Chat completion response (non-streaming)
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// Unique identifier for this completion
    #[serde(default)]
    pub id: String,
    /// Object type (usually "chat.completion")
    #[serde(default)]
    pub object: String,
    /// Creation timestamp
    #[serde(default)]
    pub created: i64,
    /// Model used
    #[serde(default)]
    pub model: String,
    /// Generated choices
    pub choices: Vec<ChatChoice>,
    /// Usage statistics
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Get the first choice's message text, if any
    pub fn content(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.message.content.text())
    }
}

/// Classification of a model by its identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Chat,
    Vision,
    Embedding,
}

impl ModelKind {
    /// Short badge text for the view layer
    pub fn label(&self) -> &'static str {
        match self {
            Self::Chat => "Chat",
            Self::Vision => "Vision",
            Self::Embedding => "Embed",
        }
    }
}

/// Classify a model by the naming conventions of local servers
pub fn model_kind(model_id: &str) -> ModelKind {
    let id = model_id.to_lowercase();
    if id.contains("embed") {
        ModelKind::Embedding
    } else if id.contains("vl") || id.contains("vision") {
        ModelKind::Vision
    } else {
        ModelKind::Chat
    }
}

/// Whether a model accepts image input alongside text
pub fn is_vision_model(model_id: &str) -> bool {
    let id = model_id.to_lowercase();
    id.contains("vl") || id.contains("vision")
}

/// Whether a model is an embedding model (hidden from the chat model list)
pub fn is_embedding_model(model_id: &str) -> bool {
    let id = model_id.to_lowercase();
    id.contains("embed") || id.contains("nomic")
}

/// Prettify a model id for display: `owner/some-model` becomes `Some Model`
pub fn display_name(model_id: &str) -> String {
    let name = model_id.rsplit('/').next().unwrap_or(model_id);
    name.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
