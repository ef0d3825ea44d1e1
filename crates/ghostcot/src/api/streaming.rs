//! Server-Sent Events (SSE) decoding for streamed chat completions.
//!
//! [`SseDecoder`] turns raw response bytes into [`ChatDelta`]s and
//! [`delta_stream`] drives it from a live `reqwest::Response`, yielding
//! deltas as soon as each `data:` line is complete.

use std::collections::VecDeque;

use serde::Deserialize;
use tracing::{debug, trace, warn};

use super::TransportError;
use crate::transport::{ChatDelta, DeltaStream};

/// Raw SSE data chunk from the chat completions API.
#[derive(Deserialize, Debug)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
    error: Option<StreamError>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: Option<StreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamError {
    message: String,
}

/// Incremental SSE line decoder.
///
/// Bytes are buffered until a full line is available, so a UTF-8 character
/// split across network chunks is decoded intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `data: [DONE]` has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes and return the deltas from every completed line.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<ChatDelta>, TransportError> {
        self.buffer.extend_from_slice(chunk);
        let mut deltas = Vec::new();
        while !self.done
            && let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n')
        {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            self.decode_line(&String::from_utf8_lossy(&line), &mut deltas)?;
        }
        Ok(deltas)
    }

    /// Decode whatever remains after the body ends without a final newline.
    pub fn finish(&mut self) -> Result<Vec<ChatDelta>, TransportError> {
        let mut deltas = Vec::new();
        if !self.done && !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.decode_line(&String::from_utf8_lossy(&rest), &mut deltas)?;
        }
        self.done = true;
        Ok(deltas)
    }

    fn decode_line(
        &mut self,
        line: &str,
        deltas: &mut Vec<ChatDelta>,
    ) -> Result<(), TransportError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(':') {
            return Ok(());
        }
        let Some(data) = line.strip_prefix("data:").map(str::trim_start) else {
            trace!("Ignoring SSE field: {line}");
            return Ok(());
        };
        if data == "[DONE]" {
            self.done = true;
            return Ok(());
        }
        parse_sse_data(data, deltas)
    }
}

/// Parse a single SSE `data:` payload into deltas.
fn parse_sse_data(data: &str, deltas: &mut Vec<ChatDelta>) -> Result<(), TransportError> {
    let chunk = match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("Failed to parse SSE chunk: {e}, data: {data}");
            return Ok(());
        }
    };

    if let Some(err) = chunk.error {
        return Err(TransportError::Api(err.message));
    }

    for choice in chunk.choices.unwrap_or_default() {
        if let Some(delta) = choice.delta
            && let Some(content) = delta.content
            && !content.is_empty()
        {
            deltas.push(ChatDelta {
                content: Some(content),
            });
        }
        if choice.finish_reason.is_some() {
            trace!("Stream finish_reason: {:?}", choice.finish_reason);
        }
    }
    Ok(())
}

/// Read state carried between polls of [`delta_stream`].
struct StreamState {
    response: reqwest::Response,
    decoder: SseDecoder,
    pending: VecDeque<ChatDelta>,
    finished: bool,
    received: usize,
}

/// Turn a successful streaming response into a lazy delta stream.
///
/// The body is read one network chunk at a time, only when the consumer
/// asks for the next delta. The first read error ends the stream.
pub(crate) fn delta_stream(response: reqwest::Response) -> DeltaStream<TransportError> {
    let state = StreamState {
        response,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
        received: 0,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(delta) = state.pending.pop_front() {
                state.received += 1;
                return Some((Ok(delta), state));
            }
            if state.finished {
                debug!("Stream completed with {} deltas", state.received);
                return None;
            }

            let decoded = match state.response.chunk().await {
                Ok(Some(bytes)) => state.decoder.push(&bytes),
                Ok(None) => state.decoder.finish(),
                Err(e) => Err(TransportError::Request(e)),
            };
            match decoded {
                Ok(deltas) => {
                    state.pending.extend(deltas);
                    if state.decoder.is_done() {
                        state.finished = true;
                    }
                }
                Err(e) => {
                    state.finished = true;
                    state.pending.clear();
                    return Some((Err(e), state));
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(deltas: &[ChatDelta]) -> Vec<&str> {
        deltas.iter().filter_map(|d| d.content.as_deref()).collect()
    }

    #[test]
    fn decodes_complete_lines() {
        let mut decoder = SseDecoder::new();
        let deltas = decoder
            .push(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n\
                  data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            )
            .unwrap();
        assert_eq!(contents(&deltas), vec!["Hel", "lo"]);
        assert!(!decoder.is_done());
    }

    #[test]
    fn buffers_partial_lines_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(
            decoder
                .push(b"data: {\"choices\":[{\"delta\":{\"con")
                .unwrap()
                .is_empty()
        );
        let deltas = decoder.push(b"tent\":\"hi\"}}]}\n").unwrap();
        assert_eq!(contents(&deltas), vec!["hi"]);
    }

    #[test]
    fn multibyte_char_split_across_chunks_survives() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"π\"}}]}\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xCF).unwrap() + 1;
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&line[..split]).unwrap().is_empty());
        let deltas = decoder.push(&line[split..]).unwrap();
        assert_eq!(contents(&deltas), vec!["π"]);
    }

    #[test]
    fn done_marker_stops_decoding() {
        let mut decoder = SseDecoder::new();
        let deltas = decoder
            .push(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\
                  data: [DONE]\n\
                  data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
            )
            .unwrap();
        assert_eq!(contents(&deltas), vec!["a"]);
        assert!(decoder.is_done());
    }

    #[test]
    fn comments_roles_and_empty_content_are_skipped() {
        let mut decoder = SseDecoder::new();
        let deltas = decoder
            .push(
                b": keep-alive\n\
                  data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\
                  data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n\
                  data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
            )
            .unwrap();
        assert!(deltas.is_empty());
    }

    #[test]
    fn malformed_payload_is_ignored() {
        let mut decoder = SseDecoder::new();
        let deltas = decoder.push(b"data: {not json}\n").unwrap();
        assert!(deltas.is_empty());
    }

    #[test]
    fn error_payload_is_reported() {
        let mut decoder = SseDecoder::new();
        let err = decoder
            .push(b"data: {\"error\":{\"message\":\"overloaded\"}}\n")
            .unwrap_err();
        assert!(matches!(err, TransportError::Api(ref m) if m == "overloaded"));
    }

    #[test]
    fn finish_decodes_trailing_line_without_newline() {
        let mut decoder = SseDecoder::new();
        assert!(
            decoder
                .push(b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}")
                .unwrap()
                .is_empty()
        );
        let deltas = decoder.finish().unwrap();
        assert_eq!(contents(&deltas), vec!["tail"]);
        assert!(decoder.is_done());
    }
}
