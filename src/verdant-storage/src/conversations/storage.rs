//! Conversation storage operations.
//!
//! Each conversation is one pretty-printed JSON document under
//! `conversations/{id}.json`. Saves flush and fsync so a reported success
//! means the record is durable.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{Result, StorageError};
use crate::paths::VerdantPaths;

use super::query::ConversationQuery;
use super::types::Conversation;

/// Centralized conversation storage manager.
#[derive(Debug, Clone)]
pub struct ConversationStorage {
    paths: VerdantPaths,
}

/// Document shape written by [`ConversationStorage::export`].
#[derive(Debug, Serialize)]
struct ConversationExport<'a> {
    title: &'a str,
    messages: &'a [super::types::Message],
    exported_at: String,
}

impl ConversationStorage {
    /// Create storage with automatic path detection.
    pub fn new() -> Result<Self> {
        let paths = VerdantPaths::new()?;
        Ok(Self { paths })
    }

    /// Create storage with custom paths.
    pub fn with_paths(paths: VerdantPaths) -> Self {
        Self { paths }
    }

    /// Initialize storage (create directories).
    pub async fn init(&self) -> Result<()> {
        self.paths.ensure_dirs_async().await?;
        info!(data_dir = %self.paths.data_dir.display(), "Conversation storage initialized");
        Ok(())
    }

    /// Get the underlying paths.
    pub fn paths(&self) -> &VerdantPaths {
        &self.paths
    }

    /// List all conversations, most recently updated first.
    pub async fn list(&self) -> Result<Vec<Conversation>> {
        let mut conversations = Vec::new();

        if !self.paths.conversations_dir.exists() {
            return Ok(conversations);
        }

        let mut entries = fs::read_dir(&self.paths.conversations_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match self.load_from_path(&path).await {
                    Ok(conversation) => conversations.push(conversation),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to load conversation")
                    }
                }
            }
        }

        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    /// Get a conversation by ID.
    pub async fn get(&self, id: &str) -> Result<Conversation> {
        let path = self.paths.conversation_path(id);
        if !path.exists() {
            return Err(StorageError::ConversationNotFound(id.to_string()));
        }
        self.load_from_path(&path).await
    }

    /// Save a conversation to disk.
    ///
    /// Flushes and fsyncs before returning so in-memory state is never ahead
    /// of durable state once the caller proceeds.
    pub async fn save(&self, conversation: &Conversation) -> Result<()> {
        let path = self.paths.conversation_path(&conversation.id);
        let content = serde_json::to_string_pretty(conversation)?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        file.sync_all().await?;

        // Sync parent directory on Unix so the directory entry is persisted too
        #[cfg(unix)]
        {
            if let Some(parent) = path.parent() {
                if let Ok(dir) = fs::File::open(parent).await {
                    let _ = dir.sync_all().await;
                }
            }
        }

        debug!(conversation_id = %conversation.id, "Conversation saved");
        Ok(())
    }

    /// Delete a conversation.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let path = self.paths.conversation_path(id);
        if path.exists() {
            fs::remove_file(&path).await?;
        }
        info!(conversation_id = %id, "Conversation deleted");
        Ok(())
    }

    /// Number of stored conversations.
    pub async fn count(&self) -> Result<usize> {
        Ok(self.list().await?.len())
    }

    /// Query conversations with filters.
    pub async fn query(&self, query: &ConversationQuery) -> Result<Vec<Conversation>> {
        let all = self.list().await?;
        let mut filtered: Vec<_> = all.into_iter().filter(|c| query.matches(c)).collect();
        query.apply_sort(&mut filtered);
        Ok(query.apply_pagination(filtered))
    }

    /// Free-text search over titles and message text.
    pub async fn search(&self, text: &str) -> Result<Vec<Conversation>> {
        self.query(&ConversationQuery::new().search(text)).await
    }

    /// Export a conversation as a formatted JSON document under `exports/`.
    ///
    /// Returns the path of the written file.
    pub async fn export(&self, conversation: &Conversation) -> Result<PathBuf> {
        let document = ConversationExport {
            title: &conversation.title,
            messages: &conversation.messages,
            exported_at: Utc::now().to_rfc3339(),
        };
        let contents = serde_json::to_string_pretty(&document)?;
        let filename = export_filename(&conversation.title, "json");
        self.write_export(&filename, &contents).await
    }

    /// Write an already-rendered export document under `exports/`.
    pub async fn write_export(&self, filename: &str, contents: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.paths.exports_dir).await?;
        let path = self.paths.export_path(filename);
        fs::write(&path, contents).await?;
        info!(path = %path.display(), "Export written");
        Ok(path)
    }

    async fn load_from_path(&self, path: &Path) -> Result<Conversation> {
        let content = fs::read_to_string(path).await?;
        let conversation: Conversation = serde_json::from_str(&content)?;
        Ok(conversation)
    }
}

/// Derive an export filename from a conversation title: non-alphanumeric
/// characters become underscores, with a millisecond timestamp suffix.
pub fn export_filename(title: &str, extension: &str) -> String {
    let sanitized: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_{}.{}", sanitized, Utc::now().timestamp_millis(), extension)
}
