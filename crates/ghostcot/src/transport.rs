//! The model transport seam and the chat wrapper built on it.
//!
//! [`ChatTransport`] is whatever actually talks to a model. [`CotChat`]
//! composes prompt injection, one transport call, and a fresh
//! [`TagSplitter`] into a single call that returns reasoning and answer
//! separately. The wrapper never retries, never logs transport failures, and
//! hands transport errors back exactly as the transport produced them.

use std::future::Future;
use std::pin::Pin;

use futures::Stream;
use serde::Deserialize;
use tracing::debug;

use crate::Message;
use crate::config::{ConfigError, CotConfig};
use crate::prompt::inject_instruction;
use crate::splitter::{SplitResult, SplitStream, TagSplitter, TextDelta, split_complete};

/// Boxed future returned by [`ChatTransport`] methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Boxed stream of deltas returned by [`ChatTransport::stream`].
pub type DeltaStream<E> = Pin<Box<dyn Stream<Item = Result<ChatDelta, E>> + Send>>;

/// One incremental piece of a streamed response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatDelta {
    /// Answer-channel text. `None` for deltas that only carry metadata.
    pub content: Option<String>,
}

impl ChatDelta {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
        }
    }
}

impl TextDelta for ChatDelta {
    fn text(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// A complete, non-streamed response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatResponse {
    pub content: String,
    pub usage: Option<UsageInfo>,
}

/// Something that can send a conversation to a model.
///
/// Implementations own credentials, endpoints, timeouts, and any retry
/// policy. `stream` resolves once the response has started; its deltas then
/// arrive lazily.
pub trait ChatTransport: Send + Sync {
    type Error: Send + 'static;

    /// Request one complete response.
    fn complete(
        &self,
        messages: Vec<Message>,
    ) -> TransportFuture<'_, Result<ChatResponse, Self::Error>>;

    /// Request a streamed response.
    fn stream(
        &self,
        messages: Vec<Message>,
    ) -> TransportFuture<'_, Result<DeltaStream<Self::Error>, Self::Error>>;
}

/// Non-streamed result of [`CotChat::chat`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CotCompletion {
    pub reasoning: String,
    pub answer: String,
    pub usage: Option<UsageInfo>,
}

/// Wraps a transport so every call elicits and separates reasoning.
pub struct CotChat<T> {
    transport: T,
    config: CotConfig,
    instruction: String,
}

impl<T: ChatTransport> CotChat<T> {
    /// Validate `config` and wrap `transport`.
    pub fn new(transport: T, config: CotConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let instruction = config.instruction();
        Ok(Self {
            transport,
            config,
            instruction,
        })
    }

    pub fn config(&self) -> &CotConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The conversation actually sent to the model.
    pub fn prepare(&self, messages: &[Message]) -> Vec<Message> {
        inject_instruction(messages, &self.instruction)
    }

    /// Send `messages` and split the complete response.
    pub async fn chat(&self, messages: &[Message]) -> Result<CotCompletion, T::Error> {
        let prepared = self.prepare(messages);
        debug!(messages = prepared.len(), "sending tagged completion request");

        let response = self.transport.complete(prepared).await?;
        let SplitResult { reasoning, answer } = split_complete(
            &response.content,
            &self.config.start_tag,
            &self.config.end_tag,
        );

        debug!(
            reasoning_chars = reasoning.len(),
            answer_chars = answer.len(),
            "split completion"
        );
        Ok(CotCompletion {
            reasoning,
            answer,
            usage: response.usage,
        })
    }

    /// Send `messages` and split the response as it streams.
    ///
    /// The returned stream is consumable once. Errors raised while it is
    /// being read are the transport's own, yielded in place.
    pub async fn chat_stream(
        &self,
        messages: &[Message],
    ) -> Result<SplitStream<DeltaStream<T::Error>>, T::Error> {
        let prepared = self.prepare(messages);
        debug!(messages = prepared.len(), "sending tagged streaming request");

        let deltas = self.transport.stream(prepared).await?;
        Ok(SplitStream::new(deltas, TagSplitter::from_config(&self.config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageRole;

    struct NullTransport;

    impl ChatTransport for NullTransport {
        type Error = String;

        fn complete(
            &self,
            _messages: Vec<Message>,
        ) -> TransportFuture<'_, Result<ChatResponse, Self::Error>> {
            Box::pin(async { Err("unreachable".to_string()) })
        }

        fn stream(
            &self,
            _messages: Vec<Message>,
        ) -> TransportFuture<'_, Result<DeltaStream<Self::Error>, Self::Error>> {
            Box::pin(async { Err("unreachable".to_string()) })
        }
    }

    #[test]
    fn empty_tags_rejected_before_any_call() {
        let config = CotConfig::default().with_tags("", "</thinking>");
        assert!(matches!(
            CotChat::new(NullTransport, config),
            Err(ConfigError::EmptyStartTag)
        ));
    }

    #[test]
    fn prepare_injects_configured_instruction() {
        let chat = CotChat::new(
            NullTransport,
            CotConfig::default().with_instruction("use tags"),
        )
        .unwrap();
        let prepared = chat.prepare(&[Message::user("q")]);
        assert_eq!(prepared[0].role, MessageRole::System);
        assert_eq!(prepared[0].content, "use tags");
        assert_eq!(prepared[1].content, "q");
    }

    #[test]
    fn chat_delta_exposes_content() {
        assert_eq!(ChatDelta::new("hi").text(), Some("hi"));
        assert_eq!(ChatDelta::default().text(), None);
    }
}
