//! Model listing and selection.

use tracing::debug;
use verdant_engine::{is_embedding_model, ApiError, ChatClient, Model};

/// Available models and the active selection.
#[derive(Debug, Default)]
pub struct ModelStore {
    models: Vec<Model>,
    selected: Option<String>,
    connected: bool,
}

impl ModelStore {
    /// Create a store, seeding the selection from persisted state.
    pub fn new(selected: Option<String>) -> Self {
        Self {
            models: Vec::new(),
            selected,
            connected: false,
        }
    }

    /// Refresh the model list from the server.
    ///
    /// Embedding models are filtered out of the chat list. When the current
    /// selection is absent or no longer served, the first model is selected.
    pub async fn refresh(&mut self, client: &ChatClient) -> Result<(), ApiError> {
        match client.fetch_models().await {
            Ok(all) => {
                self.models = all
                    .into_iter()
                    .filter(|m| !is_embedding_model(&m.id))
                    .collect();
                self.connected = true;

                let selection_gone = self
                    .selected
                    .as_ref()
                    .is_none_or(|id| !self.models.iter().any(|m| &m.id == id));
                if selection_gone {
                    self.selected = self.models.first().map(|m| m.id.clone());
                    debug!(selected = ?self.selected, "Auto-selected model");
                }
                Ok(())
            }
            Err(e) => {
                self.connected = false;
                Err(e)
            }
        }
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Select a model by id.
    pub fn select(&mut self, id: impl Into<String>) {
        self.selected = Some(id.into());
    }

    /// Whether the id is in the current model list.
    pub fn knows(&self, id: &str) -> bool {
        self.models.iter().any(|m| m.id == id)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models_body() -> String {
        serde_json::json!({
            "object": "list",
            "data": [
                {"id": "nomic-embed-text", "object": "model"},
                {"id": "llama-3.2-3b", "object": "model"},
                {"id": "qwen2-vl-7b", "object": "model"}
            ]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_refresh_filters_embeddings_and_autoselects() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/v1/models"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_raw(models_body(), "application/json"),
            )
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri());
        let mut store = ModelStore::new(None);
        store.refresh(&client).await.unwrap();

        assert!(store.is_connected());
        assert_eq!(store.models().len(), 2);
        assert_eq!(store.selected(), Some("llama-3.2-3b"));
    }

    #[tokio::test]
    async fn test_refresh_keeps_valid_persisted_selection() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/v1/models"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_raw(models_body(), "application/json"),
            )
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri());
        let mut store = ModelStore::new(Some("qwen2-vl-7b".to_string()));
        store.refresh(&client).await.unwrap();
        assert_eq!(store.selected(), Some("qwen2-vl-7b"));

        let mut stale = ModelStore::new(Some("removed-model".to_string()));
        stale.refresh(&client).await.unwrap();
        assert_eq!(stale.selected(), Some("llama-3.2-3b"));
    }

    #[tokio::test]
    async fn test_refresh_failure_marks_disconnected() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/v1/models"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri());
        let mut store = ModelStore::new(None);
        assert!(store.refresh(&client).await.is_err());
        assert!(!store.is_connected());
    }
}
