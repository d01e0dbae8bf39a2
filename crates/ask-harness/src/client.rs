use futures::stream::BoxStream;
use futures::{StreamExt as _, TryStreamExt as _};
use serde::Serialize;
use tracing::debug;

use crate::config::AskConfig;
use crate::content::Question;
use crate::errors::AskError;
use crate::sse::{SseEvent, event_stream};

/// Events of one open response, in arrival order.
pub type EventStream = BoxStream<'static, Result<SseEvent, AskError>>;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
}

fn build_request_body<'a>(
    model: &'a str,
    system_prompt: &'a str,
    question: &'a Question,
) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: [
            ChatMessage {
                role: "system",
                content: system_prompt.trim(),
            },
            ChatMessage {
                role: "user",
                content: question.as_str(),
            },
        ],
        stream: true,
    }
}

/// Pretty-prints JSON error bodies; anything else is returned as received.
fn format_error_body(raw: &str) -> String {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| raw.to_string())
}

/// Streaming chat-completions client.
pub struct AskClient {
    http: reqwest::Client,
    config: AskConfig,
}

impl AskClient {
    /// Creates a client from explicit configuration.
    pub fn new(config: AskConfig) -> Result<Self, AskError> {
        if config.api_key.trim().is_empty() {
            return Err(AskError::MissingCredential {
                var: crate::config::API_KEY_ENV_VAR,
            });
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AskError::Client(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &AskConfig {
        &self.config
    }

    /// Sends the question and waits for response headers.
    ///
    /// Returns once the endpoint accepted the request; the body is then read
    /// lazily through the returned stream. A non-success status is read in
    /// full and reported as [`AskError::Status`].
    pub async fn open_stream(
        &self,
        system_prompt: &str,
        question: &Question,
    ) -> Result<EventStream, AskError> {
        let body = build_request_body(&self.config.model, system_prompt, question);
        debug!(endpoint = %self.config.endpoint, model = %self.config.model, "sending chat completion request");

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .header("X-Title", &self.config.title)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| AskError::transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            debug!(status = status.as_u16(), "chat completion request rejected");
            return Err(AskError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                body: format_error_body(&raw),
            });
        }
        debug!(status = status.as_u16(), "response stream opened");

        let bytes = Box::pin(response.bytes_stream()).map_err(|e| AskError::transport(&e));
        Ok(event_stream(bytes).boxed())
    }
}
