//! Conversation data types.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use verdant_engine::{ContentPart, MessageContent, Role, StreamMetrics};

/// Placeholder title until the first user message arrives.
pub const DEFAULT_TITLE: &str = "New Conversation";

/// Maximum characters of message text used for an auto-derived title.
pub const TITLE_PREVIEW_LEN: usize = 40;

/// A message stored in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier.
    pub id: String,
    /// Author role.
    pub role: Role,
    /// Message content (plain text or text/image parts).
    pub content: MessageContent,
    /// Timestamp (Unix seconds).
    pub timestamp: i64,
    /// Stream metrics, only on assistant messages from a streamed turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<StreamMetrics>,
}

impl Message {
    fn new(role: Role, content: MessageContent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now().timestamp(),
            metrics: None,
        }
    }

    /// Create a new user message.
    pub fn user(content: MessageContent) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: MessageContent) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Attach stream metrics to this message.
    pub fn with_metrics(mut self, metrics: Option<StreamMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The message's text, if it has any.
    pub fn text(&self) -> Option<&str> {
        self.content.text()
    }
}

/// A persisted conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation identifier.
    pub id: String,
    /// Title (auto-derived from the first user message or user-set).
    pub title: String,
    /// Messages in order.
    pub messages: Vec<Message>,
    /// Creation timestamp (Unix seconds).
    pub created_at: i64,
    /// Last update timestamp (Unix seconds).
    pub updated_at: i64,
}

impl Conversation {
    /// Create a new empty conversation with the placeholder title.
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the timestamp to now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().timestamp();
    }

    /// Append a message.
    ///
    /// The first user message auto-derives the title while it is still the
    /// placeholder; later messages never change it.
    pub fn push_message(&mut self, message: Message) {
        if self.messages.is_empty() && message.role == Role::User && self.title == DEFAULT_TITLE {
            self.title = message_preview(&message.content, TITLE_PREVIEW_LEN);
        }
        self.messages.push(message);
        self.touch();
    }

    /// Replace a message's content (used for corrections).
    pub fn replace_message_content(&mut self, message_id: &str, content: MessageContent) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message_id) {
            Some(message) => {
                message.content = content;
                self.touch();
                true
            }
            None => false,
        }
    }

    /// Whether the title or any message text contains the lowercased needle.
    pub fn contains_text(&self, needle_lower: &str) -> bool {
        if self.title.to_lowercase().contains(needle_lower) {
            return true;
        }
        self.messages.iter().any(|m| {
            m.text()
                .is_some_and(|t| t.to_lowercase().contains(needle_lower))
        })
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract preview text from message content, truncated with an ellipsis
/// marker when longer than `max_len` characters.
pub fn message_preview(content: &MessageContent, max_len: usize) -> String {
    let text = match content {
        MessageContent::Text(text) => text.as_str(),
        MessageContent::Parts(parts) => parts
            .iter()
            .find_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ImageUrl { .. } => None,
            })
            .unwrap_or("Image message"),
    };
    if text.chars().count() > max_len {
        let truncated: String = text.chars().take(max_len).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}
