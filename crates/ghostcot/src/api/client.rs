//! Async client for OpenAI-compatible chat completions endpoints.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::TransportError;
use super::streaming::delta_stream;
use crate::Message;
use crate::transport::{ChatResponse, ChatTransport, DeltaStream, TransportFuture, UsageInfo};

/// Default API root. Any OpenAI-compatible server works.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model for all calls.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unset optional fields are omitted.
#[derive(Serialize, Debug, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

// ── Response types ─────────────────────────────────────────────────

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

// ── Client ─────────────────────────────────────────────────────────

/// HTTP transport for OpenAI-compatible chat completions.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OpenAiClient {
    /// Create a client for the default endpoint and model.
    pub fn new(api_key: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ghostcot/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
        })
    }

    /// Point the client at another OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Full URL of the chat completions endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Build the request body for `messages`.
    pub fn request(&self, messages: Vec<Message>, stream: bool) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream,
        }
    }

    async fn send(&self, body: &ChatRequest) -> Result<reqwest::Response, TransportError> {
        debug!(
            "LLM request: model={}, messages={}, stream={}, max_tokens={:?}, temp={:?}",
            body.model,
            body.messages.len(),
            body.stream,
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }
        Ok(resp)
    }

    /// Send a request and wait for the whole response.
    pub async fn chat(&self, messages: Vec<Message>) -> Result<ChatResponse, TransportError> {
        let body = self.request(messages, false);
        let start = Instant::now();

        let resp = self.send(&body).await?;
        let text = resp.text().await?;
        debug!(
            "LLM response in {:.1}s ({} bytes)",
            start.elapsed().as_secs_f64(),
            text.len()
        );

        parse_chat_response(&text)
    }

    /// Send a streaming request. Resolves once the response headers arrive.
    pub async fn chat_stream(
        &self,
        messages: Vec<Message>,
    ) -> Result<DeltaStream<TransportError>, TransportError> {
        let body = self.request(messages, true);
        let resp = self.send(&body).await?;
        debug!("Streaming response started");
        Ok(delta_stream(resp))
    }
}

fn parse_chat_response(text: &str) -> Result<ChatResponse, TransportError> {
    let parsed: RawChatResponse = serde_json::from_str(text)?;

    if let Some(err) = parsed.error {
        return Err(TransportError::Api(err.message));
    }

    if let Some(ref usage) = parsed.usage {
        debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            usage.total_tokens.unwrap_or(0),
        );
    }

    let content = parsed
        .choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message.content)
        .unwrap_or_default();

    Ok(ChatResponse {
        content,
        usage: parsed.usage,
    })
}

impl ChatTransport for OpenAiClient {
    type Error = TransportError;

    fn complete(
        &self,
        messages: Vec<Message>,
    ) -> TransportFuture<'_, Result<ChatResponse, Self::Error>> {
        Box::pin(self.chat(messages))
    }

    fn stream(
        &self,
        messages: Vec<Message>,
    ) -> TransportFuture<'_, Result<DeltaStream<Self::Error>, Self::Error>> {
        Box::pin(self.chat_stream(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_skips_unset_fields() {
        let client = OpenAiClient::new("key").unwrap();
        let json = serde_json::to_value(client.request(vec![Message::user("hi")], false)).unwrap();
        assert_eq!(json["model"], DEFAULT_MODEL);
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("temperature").is_none());
        assert!(json.get("stream").is_none());
    }

    #[test]
    fn request_carries_overrides() {
        let client = OpenAiClient::new("key")
            .unwrap()
            .with_model("local-model")
            .with_temperature(0.2)
            .with_max_tokens(512);
        let json = serde_json::to_value(client.request(vec![], true)).unwrap();
        assert_eq!(json["model"], "local-model");
        assert_eq!(json["max_tokens"], 512);
        assert_eq!(json["stream"], true);
        assert!(json.get("temperature").is_some());
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let client = OpenAiClient::new("key")
            .unwrap()
            .with_base_url("http://localhost:8000/v1/");
        assert_eq!(client.endpoint(), "http://localhost:8000/v1/chat/completions");
    }

    #[test]
    fn parses_first_choice_and_usage() {
        let resp = parse_chat_response(
            r#"{"choices":[{"message":{"role":"assistant","content":"<thinking>r</thinking>a"}}],
                "usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
        )
        .unwrap();
        assert_eq!(resp.content, "<thinking>r</thinking>a");
        assert_eq!(resp.usage.unwrap().total_tokens, Some(15));
    }

    #[test]
    fn missing_choices_yield_empty_content() {
        let resp = parse_chat_response(r#"{"choices":[]}"#).unwrap();
        assert_eq!(resp.content, "");
        assert!(resp.usage.is_none());
    }

    #[test]
    fn api_error_payload_is_an_error() {
        let err = parse_chat_response(r#"{"error":{"message":"bad key"}}"#).unwrap_err();
        assert_eq!(err.to_string(), "chat API error: bad key");
    }
}
