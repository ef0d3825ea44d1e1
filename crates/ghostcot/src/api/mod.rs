//! OpenAI-compatible HTTP transport.
//!
//! - [`client`]: [`OpenAiClient`], a [`ChatTransport`](crate::transport::ChatTransport)
//!   for any endpoint speaking the chat completions protocol.
//! - [`streaming`]: SSE decoder and the lazy delta stream behind
//!   [`OpenAiClient`]'s streaming calls.

pub mod client;
pub mod streaming;

pub use client::{ChatRequest, DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAiClient};

/// Failure talking to the model endpoint.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The endpoint answered with a non-success status.
    #[error("chat API HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    /// The response body was not the expected JSON.
    #[error("failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),
    /// The endpoint reported an error in the payload.
    #[error("chat API error: {0}")]
    Api(String),
}
