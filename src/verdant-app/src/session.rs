//! Chat orchestration.
//!
//! `ChatSession` is the only component that mutates conversation state in
//! response to a user action. One turn runs
//! `idle -> dispatched -> streaming -> {completed | cancelled | failed} -> idle`;
//! the generating flag covers the whole span and gates duplicate submission.

use std::path::PathBuf;

use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use verdant_engine::{
    ChatClient, ChatMessage, ContentPart, ImageUrl, MessageContent, Model, StreamChunk,
};
use verdant_storage::{Conversation, ConversationStorage, Message};

use crate::conversations::ConversationManager;
use crate::error::{AppError, Result};
use crate::models::ModelStore;
use crate::notify::Notifier;
use crate::settings::{Preset, Settings, SettingsStore};

/// Prompt substituted when an image is attached with no text.
pub const VISION_FALLBACK_PROMPT: &str = "What do you see in this image?";

/// Orchestrates user turns against the completion engine.
pub struct ChatSession {
    client: ChatClient,
    conversations: ConversationManager,
    settings: SettingsStore,
    models: ModelStore,
    notifier: Notifier,
    live_tx: watch::Sender<String>,
    generating: bool,
    cancel: Option<CancellationToken>,
}

impl ChatSession {
    pub fn new(client: ChatClient, storage: ConversationStorage, settings: SettingsStore) -> Self {
        let models = ModelStore::new(settings.settings().selected_model.clone());
        let (live_tx, _) = watch::channel(String::new());
        Self {
            client,
            conversations: ConversationManager::new(storage),
            settings,
            models,
            notifier: Notifier::new(),
            live_tx,
            generating: false,
            cancel: None,
        }
    }

    /// Load persisted conversations and select one.
    pub async fn init(&mut self) -> Result<()> {
        self.conversations.load().await
    }

    // ========================================================================
    // Turn lifecycle
    // ========================================================================

    /// Submit a user turn with an internally created cancellation token.
    pub async fn submit(&mut self, text: &str, image: Option<String>) -> Result<()> {
        self.submit_with_cancel(text, image, CancellationToken::new())
            .await
    }

    /// Submit a user turn.
    ///
    /// Validation failures are pushed to the notifier and returned without
    /// touching any state. Otherwise the user message is committed, the
    /// completion path runs, and the assistant message is committed per the
    /// turn's terminal outcome.
    pub async fn submit_with_cancel(
        &mut self,
        text: &str,
        image: Option<String>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let text = text.trim();
        if text.is_empty() && image.is_none() {
            return self.reject(AppError::EmptySubmission);
        }
        let Some(model) = self.models.selected().map(str::to_string) else {
            return self.reject(AppError::NoModelSelected);
        };
        let Some(conversation_id) = self.conversations.active_id().map(str::to_string) else {
            return self.reject(AppError::NoActiveConversation);
        };
        if self.generating {
            return self.reject(AppError::AlreadyGenerating);
        }

        let content = match image {
            Some(url) => MessageContent::Parts(vec![
                ContentPart::Text {
                    text: if text.is_empty() {
                        VISION_FALLBACK_PROMPT.to_string()
                    } else {
                        text.to_string()
                    },
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url },
                },
            ]),
            None => MessageContent::Text(text.to_string()),
        };

        if let Err(e) = self
            .conversations
            .add_message(&conversation_id, Message::user(content))
            .await
        {
            self.notifier.error(e.to_string());
            return Err(e);
        }

        let history: Vec<ChatMessage> = self
            .conversations
            .active()
            .map(|c| {
                c.messages
                    .iter()
                    .map(|m| ChatMessage::new(m.role, m.content.clone()))
                    .collect()
            })
            .unwrap_or_default();

        self.generating = true;
        self.cancel = Some(cancel.clone());
        let _ = self.live_tx.send(String::new());

        let result = self
            .run_completion(&model, &conversation_id, history, cancel)
            .await;

        self.generating = false;
        self.cancel = None;
        let _ = self.live_tx.send(String::new());

        if let Err(e) = &result {
            self.notifier.error(e.to_string());
        }
        result
    }

    async fn run_completion(
        &mut self,
        model: &str,
        conversation_id: &str,
        history: Vec<ChatMessage>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let params = self.settings.settings().parameters.clone();

        if self.settings.settings().streaming {
            let mut chunks = self
                .client
                .stream_chat(model, &history, &params, cancel)
                .await?;

            let mut full = String::new();
            let mut metrics = None;
            while let Some(chunk) = chunks.next().await {
                match chunk? {
                    StreamChunk::Content(delta) => {
                        // Deltas apply in the exact order the decoder yields.
                        full.push_str(&delta);
                        let _ = self.live_tx.send(full.clone());
                    }
                    StreamChunk::Metrics(m) => metrics = Some(m),
                }
            }

            // Cancellation with partial output still commits; with nothing
            // accumulated, nothing is committed.
            if !full.is_empty() {
                let message = Message::assistant(MessageContent::Text(full)).with_metrics(metrics);
                self.conversations
                    .add_message(conversation_id, message)
                    .await?;
            } else {
                debug!("Stream ended with no content, nothing committed");
            }
        } else {
            let content = self.client.chat(model, &history, &params).await?;
            self.conversations
                .add_message(conversation_id, Message::assistant(MessageContent::Text(content)))
                .await?;
        }
        Ok(())
    }

    /// Cancel the in-flight streamed request, if any. Idempotent.
    pub fn stop(&self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
    }

    /// Whether a turn is currently in flight.
    pub fn is_generating(&self) -> bool {
        self.generating
    }

    /// Observe the running accumulation buffer for live display.
    pub fn subscribe_live(&self) -> watch::Receiver<String> {
        self.live_tx.subscribe()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    fn reject(&self, error: AppError) -> Result<()> {
        self.notifier.error(error.to_string());
        Err(error)
    }

    // ========================================================================
    // Conversations
    // ========================================================================

    pub fn active(&self) -> Option<&Conversation> {
        self.conversations.active()
    }

    pub fn conversations(&self) -> &[Conversation] {
        self.conversations.conversations()
    }

    pub async fn new_conversation(&mut self) -> Result<String> {
        self.conversations.create().await
    }

    pub async fn delete_conversation(&mut self, id: &str) -> Result<()> {
        self.conversations.delete(id).await
    }

    pub fn select_conversation(&mut self, id: &str) -> bool {
        self.conversations.select(id)
    }

    pub async fn rename_active(&mut self, title: &str) -> Result<()> {
        let Some(id) = self.conversations.active_id().map(str::to_string) else {
            return Err(AppError::NoActiveConversation);
        };
        self.conversations.rename(&id, title).await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Conversation>> {
        self.conversations.search(query).await
    }

    /// Export the active conversation; returns the written file's path.
    pub async fn export_active(&self, html: bool) -> Result<PathBuf> {
        let Some(id) = self.conversations.active_id() else {
            return Err(AppError::NoActiveConversation);
        };
        if html {
            self.conversations.export_html(id).await
        } else {
            self.conversations.export(id).await
        }
    }

    // ========================================================================
    // Models
    // ========================================================================

    pub fn models(&self) -> &[Model] {
        self.models.models()
    }

    pub fn selected_model(&self) -> Option<&str> {
        self.models.selected()
    }

    pub fn is_connected(&self) -> bool {
        self.models.is_connected()
    }

    /// Refresh the model list; failures surface through the notifier.
    pub async fn refresh_models(&mut self) -> Result<()> {
        if let Err(e) = self.models.refresh(&self.client).await {
            self.notifier.error(e.to_string());
            return Err(e.into());
        }
        let selected = self.models.selected().map(str::to_string);
        if selected != self.settings.settings().selected_model {
            self.settings.set_selected_model(selected)?;
        }
        Ok(())
    }

    /// Select a model and persist the choice.
    pub fn select_model(&mut self, id: &str) -> Result<()> {
        self.models.select(id);
        self.settings.set_selected_model(Some(id.to_string()))
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub fn settings(&self) -> &Settings {
        self.settings.settings()
    }

    pub fn apply_preset(&mut self, preset: Preset) -> Result<()> {
        self.settings.apply_preset(preset)
    }

    pub fn toggle_streaming(&mut self) -> Result<bool> {
        self.settings.toggle_streaming()
    }

    pub fn set_system_prompt(&mut self, prompt: &str) -> Result<()> {
        self.settings.set_system_prompt(prompt)
    }
}
