//! Conversation lifecycle management.
//!
//! Holds the in-memory conversation list in front of the storage
//! collaborator. Every mutation is store-write-then-state-update: a crash
//! mid-write can never leave memory ahead of disk.

use std::path::PathBuf;

use tracing::info;
use verdant_markdown::escape_html;
use verdant_storage::{Conversation, ConversationStorage, Message, StorageError};

use crate::error::{AppError, Result};

/// In-memory conversation list backed by the persistence collaborator.
///
/// The list is never empty while the application runs: deleting the last
/// conversation immediately creates a fresh one.
#[derive(Debug)]
pub struct ConversationManager {
    storage: ConversationStorage,
    conversations: Vec<Conversation>,
    active_id: Option<String>,
}

impl ConversationManager {
    pub fn new(storage: ConversationStorage) -> Self {
        Self {
            storage,
            conversations: Vec::new(),
            active_id: None,
        }
    }

    /// Load persisted conversations, selecting the most recent or creating
    /// a fresh one when none exist.
    pub async fn load(&mut self) -> Result<()> {
        self.conversations = self.storage.list().await?;
        match self.conversations.first() {
            Some(first) => self.active_id = Some(first.id.clone()),
            None => {
                self.create().await?;
            }
        }
        Ok(())
    }

    /// Create a new conversation and make it active.
    pub async fn create(&mut self) -> Result<String> {
        let conversation = Conversation::new();
        self.storage.save(&conversation).await?;
        let id = conversation.id.clone();
        self.conversations.insert(0, conversation);
        self.active_id = Some(id.clone());
        info!(conversation_id = %id, "Conversation created");
        Ok(id)
    }

    /// Delete a conversation.
    ///
    /// Deleting the active one selects the next most recent, or creates a
    /// fresh conversation when it was the last.
    pub async fn delete(&mut self, id: &str) -> Result<()> {
        self.storage.delete(id).await?;
        self.conversations.retain(|c| c.id != id);

        if self.active_id.as_deref() == Some(id) {
            match self.conversations.first() {
                Some(next) => self.active_id = Some(next.id.clone()),
                None => {
                    self.create().await?;
                }
            }
        }
        Ok(())
    }

    /// Make a conversation active. Returns false for an unknown id.
    pub fn select(&mut self, id: &str) -> bool {
        if self.conversations.iter().any(|c| c.id == id) {
            self.active_id = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// Set a conversation's title (user override).
    pub async fn rename(&mut self, id: &str, title: &str) -> Result<()> {
        let pos = self.position(id)?;
        let mut updated = self.conversations[pos].clone();
        updated.title = title.to_string();
        updated.touch();
        self.storage.save(&updated).await?;
        self.conversations[pos] = updated;
        Ok(())
    }

    /// Append a message to a conversation.
    pub async fn add_message(&mut self, id: &str, message: Message) -> Result<()> {
        let pos = self.position(id)?;
        let mut updated = self.conversations[pos].clone();
        updated.push_message(message);
        self.storage.save(&updated).await?;
        self.conversations[pos] = updated;
        Ok(())
    }

    /// Replace a stored message's content (corrections).
    pub async fn replace_message_content(
        &mut self,
        id: &str,
        message_id: &str,
        content: verdant_engine::MessageContent,
    ) -> Result<()> {
        let pos = self.position(id)?;
        let mut updated = self.conversations[pos].clone();
        if !updated.replace_message_content(message_id, content) {
            return Ok(());
        }
        self.storage.save(&updated).await?;
        self.conversations[pos] = updated;
        Ok(())
    }

    /// The active conversation, if one is selected.
    pub fn active(&self) -> Option<&Conversation> {
        let id = self.active_id.as_deref()?;
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Free-text search over stored conversations.
    pub async fn search(&self, query: &str) -> Result<Vec<Conversation>> {
        Ok(self.storage.search(query).await?)
    }

    /// Export a conversation as a formatted JSON document.
    pub async fn export(&self, id: &str) -> Result<PathBuf> {
        let conversation = self.get(id)?;
        if conversation.messages.is_empty() {
            return Err(AppError::EmptyExport);
        }
        Ok(self.storage.export(conversation).await?)
    }

    /// Export a conversation as a standalone HTML transcript.
    pub async fn export_html(&self, id: &str) -> Result<PathBuf> {
        let conversation = self.get(id)?;
        if conversation.messages.is_empty() {
            return Err(AppError::EmptyExport);
        }
        let html = transcript_html(conversation);
        let filename = verdant_storage::export_filename(&conversation.title, "html");
        Ok(self.storage.write_export(&filename, &html).await?)
    }

    fn get(&self, id: &str) -> Result<&Conversation> {
        self.conversations
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::Storage(StorageError::ConversationNotFound(id.to_string())))
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.conversations
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| AppError::Storage(StorageError::ConversationNotFound(id.to_string())))
    }
}

/// Render a conversation as a standalone HTML document.
fn transcript_html(conversation: &Conversation) -> String {
    let mut body = String::new();
    for message in &conversation.messages {
        let rendered = verdant_markdown::render(&message.content);
        body.push_str(&format!(
            "<section class=\"message {}\">{}",
            message.role.as_str(),
            rendered.html
        ));
        for image in rendered.images {
            body.push_str(&format!("<img src=\"{image}\" alt=\"attachment\">"));
        }
        body.push_str("</section>\n");
    }
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{}</title></head><body>\n{}</body></html>\n",
        escape_html(&conversation.title),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdant_engine::MessageContent;
    use verdant_storage::{VerdantPaths, DEFAULT_TITLE};

    async fn manager() -> ConversationManager {
        let dir = tempfile::tempdir().unwrap();
        let paths = VerdantPaths::from_root(dir.path().to_path_buf());
        let storage = ConversationStorage::with_paths(paths);
        storage.init().await.unwrap();
        // Leak the tempdir so the files outlive the helper.
        std::mem::forget(dir);
        ConversationManager::new(storage)
    }

    fn text(s: &str) -> MessageContent {
        MessageContent::Text(s.to_string())
    }

    #[tokio::test]
    async fn test_load_creates_first_conversation() {
        let mut manager = manager().await;
        manager.load().await.unwrap();
        assert_eq!(manager.conversations().len(), 1);
        assert!(manager.active().is_some());
        assert_eq!(manager.active().unwrap().title, DEFAULT_TITLE);
    }

    #[tokio::test]
    async fn test_delete_last_conversation_leaves_exactly_one() {
        let mut manager = manager().await;
        manager.load().await.unwrap();
        let original = manager.active_id().unwrap().to_string();

        manager.delete(&original).await.unwrap();

        assert_eq!(manager.conversations().len(), 1);
        let fresh = manager.active_id().unwrap();
        assert_ne!(fresh, original);
    }

    #[tokio::test]
    async fn test_delete_active_selects_next_most_recent() {
        let mut manager = manager().await;
        manager.load().await.unwrap();
        let first = manager.active_id().unwrap().to_string();
        let second = manager.create().await.unwrap();

        manager.delete(&second).await.unwrap();
        assert_eq!(manager.active_id(), Some(first.as_str()));
        assert_eq!(manager.conversations().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_inactive_keeps_selection() {
        let mut manager = manager().await;
        manager.load().await.unwrap();
        let first = manager.active_id().unwrap().to_string();
        let second = manager.create().await.unwrap();

        manager.delete(&first).await.unwrap();
        assert_eq!(manager.active_id(), Some(second.as_str()));
    }

    #[tokio::test]
    async fn test_add_message_persists_and_titles() {
        let mut manager = manager().await;
        manager.load().await.unwrap();
        let id = manager.active_id().unwrap().to_string();

        manager
            .add_message(&id, Message::user(text("What is ownership?")))
            .await
            .unwrap();

        let active = manager.active().unwrap();
        assert_eq!(active.messages.len(), 1);
        assert_eq!(active.title, "What is ownership?");
    }

    #[tokio::test]
    async fn test_rename_overrides_title() {
        let mut manager = manager().await;
        manager.load().await.unwrap();
        let id = manager.active_id().unwrap().to_string();

        manager.rename(&id, "My title").await.unwrap();
        assert_eq!(manager.active().unwrap().title, "My title");
    }

    #[tokio::test]
    async fn test_export_empty_conversation_is_rejected() {
        let mut manager = manager().await;
        manager.load().await.unwrap();
        let id = manager.active_id().unwrap().to_string();

        assert!(matches!(
            manager.export(&id).await,
            Err(AppError::EmptyExport)
        ));
    }

    #[tokio::test]
    async fn test_export_html_renders_markdown() {
        let mut manager = manager().await;
        manager.load().await.unwrap();
        let id = manager.active_id().unwrap().to_string();
        manager
            .add_message(&id, Message::user(text("show me **bold**")))
            .await
            .unwrap();

        let path = manager.export_html(&id).await.unwrap();
        let html = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("class=\"message user\""));
    }
}
