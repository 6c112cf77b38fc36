//! Conversation query and filtering.

use super::types::Conversation;

/// Sort order for conversation queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConversationSort {
    /// Sort by updated timestamp, newest first (default).
    #[default]
    UpdatedDesc,
    /// Sort by updated timestamp, oldest first.
    UpdatedAsc,
    /// Sort by created timestamp, newest first.
    CreatedDesc,
    /// Sort by title alphabetically.
    TitleAsc,
}

/// Query/filter for conversations.
#[derive(Debug, Clone, Default)]
pub struct ConversationQuery {
    /// Case-insensitive substring search over title and message text.
    pub search: Option<String>,
    /// Filter by conversations updated after this timestamp.
    pub from_timestamp: Option<i64>,
    /// Filter by conversations updated before this timestamp.
    pub to_timestamp: Option<i64>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: usize,
    /// Sort order.
    pub sort: ConversationSort,
}

impl ConversationQuery {
    /// Create a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set text search filter.
    pub fn search(mut self, query: impl Into<String>) -> Self {
        self.search = Some(query.into());
        self
    }

    /// Filter by conversations updated after this timestamp.
    pub fn from(mut self, timestamp: i64) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    /// Filter by conversations updated before this timestamp.
    pub fn to(mut self, timestamp: i64) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    /// Set maximum results.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Set offset for pagination.
    pub fn offset(mut self, n: usize) -> Self {
        self.offset = n;
        self
    }

    /// Set sort order.
    pub fn sort_by(mut self, sort: ConversationSort) -> Self {
        self.sort = sort;
        self
    }

    /// Check if a conversation matches this query.
    pub fn matches(&self, conversation: &Conversation) -> bool {
        if let Some(from) = self.from_timestamp {
            if conversation.updated_at < from {
                return false;
            }
        }

        if let Some(to) = self.to_timestamp {
            if conversation.updated_at > to {
                return false;
            }
        }

        if let Some(ref search) = self.search {
            let needle = search.to_lowercase();
            if !conversation.contains_text(&needle) {
                return false;
            }
        }

        true
    }

    /// Apply sorting to a list of conversations.
    pub fn apply_sort(&self, conversations: &mut [Conversation]) {
        match self.sort {
            ConversationSort::UpdatedDesc => {
                conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at))
            }
            ConversationSort::UpdatedAsc => {
                conversations.sort_by(|a, b| a.updated_at.cmp(&b.updated_at))
            }
            ConversationSort::CreatedDesc => {
                conversations.sort_by(|a, b| b.created_at.cmp(&a.created_at))
            }
            ConversationSort::TitleAsc => conversations.sort_by(|a, b| a.title.cmp(&b.title)),
        }
    }

    /// Apply offset and limit to a list of conversations.
    pub fn apply_pagination(&self, conversations: Vec<Conversation>) -> Vec<Conversation> {
        conversations
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}
