//! Ghost chain-of-thought: reasoning/answer separation for models that do not
//! produce it natively.
//!
//! `ghostcot` asks a model to wrap its reasoning in a pair of literal tags,
//! then re-parses the model's output, streamed or complete, into two
//! channels: reasoning and answer. The result looks like the two-channel
//! output of models with native reasoning support.
//!
//! The pipeline has three stages, and only the last one is stateful:
//!
//! 1. [`prompt::inject_instruction`] merges the tag instruction into the
//!    conversation's system message.
//! 2. A [`ChatTransport`](transport::ChatTransport) sends the rewritten
//!    conversation to the model. [`api::OpenAiClient`] is the bundled
//!    OpenAI-compatible implementation; any other transport can be plugged
//!    in.
//! 3. [`splitter::TagSplitter`] turns raw output fragments into
//!    [`OutputFragment`](splitter::OutputFragment)s, one channel each.
//!
//! [`CotChat`](transport::CotChat) wires the three together.
//!
//! # Getting started
//!
//! ```ignore
//! use futures::StreamExt;
//! use ghostcot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OpenAiClient::new(std::env::var("OPENAI_API_KEY")?)?
//!         .with_model("gpt-4o-mini");
//!     let chat = CotChat::new(client, CotConfig::default())?;
//!
//!     let mut stream = chat.chat_stream(&[Message::user("2 + π ≈ ?")]).await?;
//!     while let Some(fragment) = stream.next().await {
//!         match fragment? {
//!             OutputFragment::Reasoning(text) => eprint!("{text}"),
//!             OutputFragment::Answer(text) => print!("{text}"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | [`CotConfig`](config::CotConfig): tags and instruction |
//! | [`prompt`] | Default instruction template and system-message injection |
//! | [`splitter`] | Incremental tag splitter plus stream and iterator adapters |
//! | [`transport`] | [`ChatTransport`](transport::ChatTransport) seam and the [`CotChat`](transport::CotChat) wrapper |
//! | [`api`] | OpenAI-compatible HTTP transport with SSE streaming |

pub mod api;
pub mod config;
pub mod prelude;
pub mod prompt;
pub mod splitter;
pub mod transport;

use serde::{Deserialize, Serialize};

// ── Constants ──────────────────────────────────────────────────────

/// Default tag opening the reasoning block.
pub const DEFAULT_START_TAG: &str = "<thinking>";

/// Default tag closing the reasoning block.
pub const DEFAULT_END_TAG: &str = "</thinking>";

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
///
/// Roles other than the four well-known ones are carried through untouched
/// as [`MessageRole::Other`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
    #[serde(untagged)]
    Other(String),
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
            MessageRole::Other(role) => write!(f, "{role}"),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}
