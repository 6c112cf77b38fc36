//! Chat client for the local completion server

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::models::{ChatMessage, ChatRequest, ChatResponse, Model, ModelsResponse, SamplingParameters};
use crate::stream::{run_decoder, StreamChunk};
use crate::{ApiError, Result};

/// Lazy, single-pass sequence of stream chunks
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(300); // 5 min timeout for completions
const CHANNEL_CAPACITY: usize = 100;

/// Client for an OpenAI-compatible completion server
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
}

impl ChatClient {
    /// Create a client without probing the server.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(COMPLETION_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Create a client and verify the server is reachable.
    pub async fn connect(base_url: impl Into<String>) -> Result<Self> {
        let client = Self::new(base_url);
        client.check_server().await?;
        Ok(client)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Check if the server is reachable
    async fn check_server(&self) -> Result<()> {
        let response = self.client.get(self.url("/models")).send().await;
        match response {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => Err(ApiError::ServerError(format!(
                "{} - server is not responding",
                resp.status()
            ))),
            Err(_) => Err(ApiError::ConnectionError),
        }
    }

    /// Fetch the list of available models from the server
    pub async fn fetch_models(&self) -> Result<Vec<Model>> {
        let response = self.client.get(self.url("/models")).send().await?;

        if response.status().is_success() {
            let models: ModelsResponse = response.json().await?;
            Ok(models.data)
        } else {
            Err(ApiError::ServerError(format!(
                "Failed to fetch models: {}",
                response.status()
            )))
        }
    }

    /// Send a non-streaming chat completion request.
    ///
    /// Returns the first choice's message text; empty when the server
    /// returned no content.
    pub async fn chat(
        &self,
        model: &str,
        history: &[ChatMessage],
        params: &SamplingParameters,
    ) -> Result<String> {
        let request = ChatRequest::new(model, build_api_messages(history, &params.system_prompt))
            .with_parameters(params)
            .with_stream(false);

        let response = self
            .client
            .post(self.url("/chat/completions"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::ServerError(error_message(response).await));
        }

        let response: ChatResponse = response.json().await?;
        Ok(response.content().unwrap_or_default().to_string())
    }

    /// Open a streaming chat completion.
    ///
    /// Fast-fails on a non-success status before any chunk is yielded. The
    /// returned sequence ends with exactly one terminal metrics chunk; firing
    /// `cancel` stops reading and yields a cancellation record instead.
    pub async fn stream_chat(
        &self,
        model: &str,
        history: &[ChatMessage],
        params: &SamplingParameters,
        cancel: CancellationToken,
    ) -> Result<ChunkStream> {
        let request = ChatRequest::new(model, build_api_messages(history, &params.system_prompt))
            .with_parameters(params)
            .with_stream(true);

        let response = self
            .client
            .post(self.url("/chat/completions"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::ServerError(error_message(response).await));
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let bytes = response.bytes_stream();
        tokio::spawn(async move {
            run_decoder(bytes, cancel, tx).await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Prepend the system prompt as a system-role message only when non-blank.
fn build_api_messages(history: &[ChatMessage], system_prompt: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if !system_prompt.trim().is_empty() {
        messages.push(ChatMessage::system(system_prompt));
    }
    messages.extend(history.iter().cloned());
    messages
}

/// Extract a human-readable message from a non-success response body.
async fn error_message(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error")?.get("message")?.as_str().map(String::from))
        .unwrap_or_else(|| "Request failed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::STOP_REASON_EOS;
    use crate::models::Role;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_fetch_models_happy_path() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/v1/models"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_raw(
                    serde_json::json!({
                        "object": "list",
                        "data": [
                            {"id": "qwen2-vl-7b", "object": "model", "owned_by": "qwen", "created": 0},
                            {"id": "llama-3.2-3b", "object": "model"}
                        ]
                    })
                    .to_string(),
                    "application/json",
                ),
            )
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri());
        let models = client.fetch_models().await.expect("fetch models");
        assert_eq!(models.len(), 2);
        assert!(models.iter().any(|m| m.id == "llama-3.2-3b"));
    }

    #[tokio::test]
    async fn test_fetch_models_server_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/v1/models"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri());
        let result = client.fetch_models().await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to fetch models")
        );
    }

    #[tokio::test]
    async fn test_chat_completion() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/chat/completions"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_raw(
                    serde_json::json!({
                        "id": "chatcmpl-123",
                        "object": "chat.completion",
                        "created": 1677652288,
                        "model": "test-model",
                        "choices": [{
                            "index": 0,
                            "message": {
                                "role": "assistant",
                                "content": "Hello! How can I help you?"
                            },
                            "finish_reason": "stop"
                        }],
                        "usage": {
                            "prompt_tokens": 9,
                            "completion_tokens": 12,
                            "total_tokens": 21
                        }
                    })
                    .to_string(),
                    "application/json",
                ),
            )
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri());
        let content = client
            .chat(
                "test-model",
                &[ChatMessage::user("Hello!")],
                &SamplingParameters::default(),
            )
            .await
            .expect("chat completion");
        assert_eq!(content, "Hello! How can I help you?");
    }

    #[tokio::test]
    async fn test_chat_surfaces_server_error_message() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/chat/completions"))
            .respond_with(
                wiremock::ResponseTemplate::new(400).set_body_raw(
                    serde_json::json!({
                        "error": {"message": "model not loaded"}
                    })
                    .to_string(),
                    "application/json",
                ),
            )
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri());
        let err = client
            .chat("missing", &[ChatMessage::user("hi")], &SamplingParameters::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model not loaded"));
    }

    #[tokio::test]
    async fn test_chat_error_without_message_uses_fallback() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/chat/completions"))
            .respond_with(wiremock::ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri());
        let err = client
            .chat("m", &[ChatMessage::user("hi")], &SamplingParameters::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Request failed"));
    }

    #[tokio::test]
    async fn test_stream_chat_yields_deltas_then_metrics() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Str\"},\"finish_reason\":null}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"eamed\"},\"finish_reason\":null}]}\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
            "data: [DONE]\n",
        );
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/chat/completions"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri());
        let mut stream = client
            .stream_chat(
                "test-model",
                &[ChatMessage::user("stream please")],
                &SamplingParameters::default(),
                CancellationToken::new(),
            )
            .await
            .expect("open stream");

        let mut text = String::new();
        let mut metrics = None;
        while let Some(chunk) = stream.next().await {
            match chunk.expect("stream chunk") {
                StreamChunk::Content(delta) => text.push_str(&delta),
                StreamChunk::Metrics(m) => metrics = Some(m),
            }
        }
        assert_eq!(text, "Streamed");
        let metrics = metrics.expect("terminal metrics");
        assert_eq!(metrics.stop_reason, STOP_REASON_EOS);
        assert_eq!(metrics.total_tokens, 3);
    }

    #[tokio::test]
    async fn test_stream_chat_fast_fails_on_error_status() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/chat/completions"))
            .respond_with(
                wiremock::ResponseTemplate::new(404).set_body_raw(
                    serde_json::json!({"error": {"message": "no such model"}}).to_string(),
                    "application/json",
                ),
            )
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri());
        let result = client
            .stream_chat(
                "nope",
                &[ChatMessage::user("hi")],
                &SamplingParameters::default(),
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(ApiError::ServerError(msg)) if msg == "no such model"));
    }

    #[test]
    fn test_build_api_messages_prepends_system_prompt() {
        let history = vec![ChatMessage::user("hi")];

        let with_prompt = build_api_messages(&history, "You are terse.");
        assert_eq!(with_prompt.len(), 2);
        assert_eq!(with_prompt[0].role, Role::System);

        let blank = build_api_messages(&history, "   ");
        assert_eq!(blank.len(), 1);
        assert_eq!(blank[0].role, Role::User);
    }
}
