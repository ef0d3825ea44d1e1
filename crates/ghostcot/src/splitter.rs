//! Incremental tag splitter: separates reasoning from answer text.
//!
//! A [`TagSplitter`] consumes raw model output one fragment at a time and
//! re-emits it as [`OutputFragment`]s attributed to the reasoning or the
//! answer channel. Fragment boundaries from the transport carry no meaning:
//! a tag may arrive split across any number of fragments and is still
//! recognized, and text that might be the beginning of a tag is held back
//! until the next fragment (or the end of the stream) resolves it.
//!
//! ```text
//!  BeforeStart ──start_tag──▶ InReasoning ──end_tag──▶ InAnswer
//!   (answer)                  (reasoning)              (answer)
//! ```
//!
//! Only the first occurrence of each tag is significant. After the end tag
//! everything, including further tags, is answer text.
//!
//! The same algorithm serves both call shapes: streaming callers use
//! [`SplitStream`] / [`SplitIter`] (or drive `feed`/`finish` directly), and
//! non-streaming callers use [`split_complete`].

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt, ready};
use tracing::trace;

use crate::config::CotConfig;

// ── Output types ───────────────────────────────────────────────────

/// Which logical channel a piece of text belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Reasoning,
    Answer,
}

/// A non-empty span of model output attributed to one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFragment {
    /// Text between the start and end tags.
    Reasoning(String),
    /// Text outside the reasoning block.
    Answer(String),
}

impl OutputFragment {
    fn new(channel: Channel, text: &str) -> Self {
        match channel {
            Channel::Reasoning => OutputFragment::Reasoning(text.to_string()),
            Channel::Answer => OutputFragment::Answer(text.to_string()),
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            OutputFragment::Reasoning(_) => Channel::Reasoning,
            OutputFragment::Answer(_) => Channel::Answer,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            OutputFragment::Reasoning(text) | OutputFragment::Answer(text) => text,
        }
    }
}

/// Both channels of a complete response, concatenated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitResult {
    pub reasoning: String,
    pub answer: String,
}

impl SplitResult {
    /// Fold a fragment sequence into its two channels.
    pub fn from_fragments<'a>(fragments: impl IntoIterator<Item = &'a OutputFragment>) -> Self {
        let mut result = SplitResult::default();
        for fragment in fragments {
            match fragment {
                OutputFragment::Reasoning(text) => result.reasoning.push_str(text),
                OutputFragment::Answer(text) => result.answer.push_str(text),
            }
        }
        result
    }
}

/// Concatenate all reasoning text from a fragment sequence.
pub fn collect_reasoning(fragments: &[OutputFragment]) -> String {
    SplitResult::from_fragments(fragments).reasoning
}

/// Concatenate all answer text from a fragment sequence.
pub fn collect_answer(fragments: &[OutputFragment]) -> String {
    SplitResult::from_fragments(fragments).answer
}

// ── State machine ──────────────────────────────────────────────────

/// Position of the splitter relative to the reasoning block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitterState {
    /// Start tag not seen yet; text is answer text.
    BeforeStart,
    /// Inside the reasoning block, waiting for the end tag.
    InReasoning,
    /// Reasoning block closed; everything else is answer text.
    InAnswer,
}

/// Stateful splitter for one model response.
///
/// Create one per request and drop it once the response is exhausted.
///
/// ```
/// use ghostcot::splitter::{OutputFragment, TagSplitter};
///
/// let mut splitter = TagSplitter::new("<thinking>", "</thinking>");
/// let mut out = splitter.feed("<thinking>2 + 2 is 4</thin");
/// out.extend(splitter.feed("king>Four."));
/// out.extend(splitter.finish());
///
/// assert_eq!(
///     out,
///     vec![
///         OutputFragment::Reasoning("2 + 2 is 4".into()),
///         OutputFragment::Answer("Four.".into()),
///     ]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct TagSplitter {
    start_tag: String,
    end_tag: String,
    state: SplitterState,
    /// Every byte received so far. Append-only.
    buffer: String,
    /// Byte offset up to which `buffer` has been emitted or consumed as a tag.
    cursor: usize,
}

impl TagSplitter {
    pub fn new(start_tag: impl Into<String>, end_tag: impl Into<String>) -> Self {
        Self {
            start_tag: start_tag.into(),
            end_tag: end_tag.into(),
            state: SplitterState::BeforeStart,
            buffer: String::new(),
            cursor: 0,
        }
    }

    pub fn from_config(config: &CotConfig) -> Self {
        Self::new(config.start_tag.clone(), config.end_tag.clone())
    }

    pub fn state(&self) -> SplitterState {
        self.state
    }

    /// Append a fragment and return whatever can now be resolved.
    ///
    /// An empty fragment is a no-op.
    pub fn feed(&mut self, fragment: &str) -> Vec<OutputFragment> {
        let mut out = Vec::new();
        if fragment.is_empty() {
            return out;
        }
        self.buffer.push_str(fragment);
        self.advance(&mut out);
        out
    }

    /// Signal end of stream and flush the held-back tail.
    ///
    /// An unterminated reasoning block is surfaced as reasoning. Text from a
    /// stream that never contained the start tag is surfaced as answer.
    /// Afterwards nothing is held back, so a second `finish` returns nothing.
    pub fn finish(&mut self) -> Vec<OutputFragment> {
        let mut out = Vec::new();
        let channel = match self.state {
            SplitterState::InReasoning => Channel::Reasoning,
            SplitterState::BeforeStart | SplitterState::InAnswer => Channel::Answer,
        };
        self.emit_until(self.buffer.len(), channel, &mut out);
        trace!(state = ?self.state, "splitter finished");
        out
    }

    /// Run transitions until the buffer cannot be resolved any further.
    fn advance(&mut self, out: &mut Vec<OutputFragment>) {
        loop {
            match self.state {
                SplitterState::BeforeStart => match self.find_from_cursor(&self.start_tag) {
                    Some(pos) => {
                        self.emit_until(pos, Channel::Answer, out);
                        self.cursor = pos + self.start_tag.len();
                        self.transition(SplitterState::InReasoning);
                    }
                    None => {
                        let safe_end = self.safe_end(&self.start_tag);
                        self.emit_until(safe_end, Channel::Answer, out);
                        return;
                    }
                },
                SplitterState::InReasoning => match self.find_from_cursor(&self.end_tag) {
                    Some(pos) => {
                        self.emit_until(pos, Channel::Reasoning, out);
                        self.cursor = pos + self.end_tag.len();
                        self.transition(SplitterState::InAnswer);
                    }
                    None => {
                        let safe_end = self.safe_end(&self.end_tag);
                        self.emit_until(safe_end, Channel::Reasoning, out);
                        return;
                    }
                },
                SplitterState::InAnswer => {
                    self.emit_until(self.buffer.len(), Channel::Answer, out);
                    return;
                }
            }
        }
    }

    fn transition(&mut self, next: SplitterState) {
        trace!(from = ?self.state, to = ?next, cursor = self.cursor, "splitter transition");
        self.state = next;
    }

    fn unemitted(&self) -> &str {
        self.buffer.get(self.cursor..).unwrap_or_default()
    }

    fn find_from_cursor(&self, tag: &str) -> Option<usize> {
        self.unemitted().find(tag).map(|offset| self.cursor + offset)
    }

    /// End of the region that cannot be the beginning of `tag`.
    ///
    /// The retained tail is the longest suffix of the unemitted text that is
    /// a proper prefix of `tag`, so it is at most `tag.len() - 1` bytes. A
    /// suffix equal to a tag prefix starts with the tag's first byte, which
    /// is never a UTF-8 continuation byte, so the result is a char boundary.
    fn safe_end(&self, tag: &str) -> usize {
        self.buffer.len() - partial_tag_len(self.unemitted(), tag)
    }

    /// Emit `cursor..end` on `channel` (if non-empty) and move the cursor.
    fn emit_until(&mut self, end: usize, channel: Channel, out: &mut Vec<OutputFragment>) {
        if end <= self.cursor {
            return;
        }
        let text = self.buffer.get(self.cursor..end).unwrap_or_default();
        if !text.is_empty() {
            out.push(OutputFragment::new(channel, text));
        }
        self.cursor = end;
    }
}

/// Length of the longest proper prefix of `tag` that `text` ends with.
fn partial_tag_len(text: &str, tag: &str) -> usize {
    let text = text.as_bytes();
    let tag = tag.as_bytes();
    let longest = tag.len().saturating_sub(1).min(text.len());
    (1..=longest)
        .rev()
        .find(|&len| text.ends_with(&tag[..len]))
        .unwrap_or(0)
}

/// Split a complete response in one pass.
///
/// Equivalent to feeding `text` as a single fragment followed by end of
/// stream, then concatenating each channel.
///
/// ```
/// use ghostcot::splitter::split_complete;
///
/// let result = split_complete("<thinking>R</thinking>A", "<thinking>", "</thinking>");
/// assert_eq!(result.reasoning, "R");
/// assert_eq!(result.answer, "A");
/// ```
pub fn split_complete(text: &str, start_tag: &str, end_tag: &str) -> SplitResult {
    let mut splitter = TagSplitter::new(start_tag, end_tag);
    let mut fragments = splitter.feed(text);
    fragments.extend(splitter.finish());
    SplitResult::from_fragments(&fragments)
}

// ── Adapters ───────────────────────────────────────────────────────

/// An upstream item that may carry text for the splitter.
///
/// Items without text (e.g. a delta holding only a role or a finish reason)
/// are skipped.
pub trait TextDelta {
    fn text(&self) -> Option<&str>;
}

impl TextDelta for String {
    fn text(&self) -> Option<&str> {
        Some(self.as_str())
    }
}

impl TextDelta for &str {
    fn text(&self) -> Option<&str> {
        Some(*self)
    }
}

impl TextDelta for Option<String> {
    fn text(&self) -> Option<&str> {
        self.as_deref()
    }
}

/// Lazily split a fallible async stream of deltas.
///
/// Each poll pulls at most as many upstream items as needed to produce the
/// next fragment. An upstream error is yielded unchanged and ends the
/// stream; the held-back tail is not flushed in that case.
pub struct SplitStream<S> {
    inner: S,
    splitter: TagSplitter,
    pending: VecDeque<OutputFragment>,
    exhausted: bool,
}

impl<S> SplitStream<S> {
    pub fn new(inner: S, splitter: TagSplitter) -> Self {
        Self {
            inner,
            splitter,
            pending: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Current state of the underlying splitter.
    pub fn state(&self) -> SplitterState {
        self.splitter.state()
    }
}

impl<S, D, E> Stream for SplitStream<S>
where
    S: Stream<Item = Result<D, E>> + Unpin,
    D: TextDelta,
{
    type Item = Result<OutputFragment, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(fragment) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(fragment)));
            }
            if this.exhausted {
                return Poll::Ready(None);
            }
            match ready!(this.inner.poll_next_unpin(cx)) {
                Some(Ok(delta)) => {
                    if let Some(text) = delta.text() {
                        this.pending.extend(this.splitter.feed(text));
                    }
                }
                Some(Err(e)) => {
                    this.exhausted = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    this.exhausted = true;
                    this.pending.extend(this.splitter.finish());
                }
            }
        }
    }
}

/// Blocking counterpart of [`SplitStream`] over an iterator.
pub struct SplitIter<I> {
    inner: I,
    splitter: TagSplitter,
    pending: VecDeque<OutputFragment>,
    exhausted: bool,
}

impl<I> SplitIter<I> {
    pub fn new(inner: I, splitter: TagSplitter) -> Self {
        Self {
            inner,
            splitter,
            pending: VecDeque::new(),
            exhausted: false,
        }
    }
}

impl<I, D, E> Iterator for SplitIter<I>
where
    I: Iterator<Item = Result<D, E>>,
    D: TextDelta,
{
    type Item = Result<OutputFragment, E>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(fragment) = self.pending.pop_front() {
                return Some(Ok(fragment));
            }
            if self.exhausted {
                return None;
            }
            match self.inner.next() {
                Some(Ok(delta)) => {
                    if let Some(text) = delta.text() {
                        self.pending.extend(self.splitter.feed(text));
                    }
                }
                Some(Err(e)) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
                None => {
                    self.exhausted = true;
                    self.pending.extend(self.splitter.finish());
                }
            }
        }
    }
}
